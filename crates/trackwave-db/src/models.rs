//! Rust models matching the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trackwave_common::{ListenerId, TrackId};

/// Stored track metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: TrackId,
    /// Account that uploaded the track; first path component of its artifacts.
    pub owner: ListenerId,
    pub artist_name: String,
    pub title: String,
    pub album_name: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub release_year: Option<i32>,
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<u32>,
    pub codec: Option<String>,
    pub added_at: DateTime<Utc>,
    pub plays: i64,
}

/// Fields supplied when a track is uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTrack {
    pub owner: ListenerId,
    pub artist_name: String,
    pub title: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Filled in from the probe before the record is written.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub codec: Option<String>,
}

impl NewTrack {
    pub fn new(
        owner: ListenerId,
        artist_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            artist_name: artist_name.into(),
            title: title.into(),
            album_name: None,
            genre: None,
            description: None,
            release_year: None,
            duration_secs: None,
            bitrate_kbps: None,
            codec: None,
        }
    }
}

/// Confirmed plays of one track by one listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackListens {
    pub listener: ListenerId,
    pub track_id: TrackId,
    pub plays: i64,
    pub last_played_at: DateTime<Utc>,
}
