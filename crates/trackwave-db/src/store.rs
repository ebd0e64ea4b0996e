//! The metadata store seam used by ingestion.

use trackwave_common::{ListenerId, Result, TrackId};

use crate::models::{NewTrack, Track};
use crate::pool::{get_conn, DbPool};
use crate::queries::{plays, tracks};

/// Where track records are written.
///
/// Ingestion writes the record first to obtain the id used in artifact
/// paths, and deletes it again if producing the artifacts fails.
pub trait MetadataStore: Send + Sync {
    fn create_track(&self, new: &NewTrack) -> Result<Track>;

    /// Returns whether a record was removed.
    fn delete_track(&self, id: TrackId) -> Result<bool>;

    fn get_track(&self, id: TrackId) -> Result<Option<Track>>;
}

/// [`MetadataStore`] over the SQLite pool.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: DbPool,
}

impl SqliteMetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Persist one confirmed play.
    pub fn record_play(&self, listener: &ListenerId, track: TrackId) -> Result<()> {
        plays::increment_plays(&*get_conn(&self.pool)?, listener, track)
    }

    pub fn list_tracks_by_owner(&self, owner: &ListenerId) -> Result<Vec<Track>> {
        tracks::list_tracks_by_owner(&*get_conn(&self.pool)?, owner)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn create_track(&self, new: &NewTrack) -> Result<Track> {
        tracks::create_track(&*get_conn(&self.pool)?, new)
    }

    fn delete_track(&self, id: TrackId) -> Result<bool> {
        tracks::delete_track(&*get_conn(&self.pool)?, id)
    }

    fn get_track(&self, id: TrackId) -> Result<Option<Track>> {
        tracks::get_track(&*get_conn(&self.pool)?, id)
    }
}
