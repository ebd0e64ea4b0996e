//! Input probing.

mod ffprobe;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};

/// What the prober found out about an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Container format name(s) as reported by the prober.
    pub container: String,
    /// Codec of the first audio stream.
    pub codec: String,
    pub duration: Option<Duration>,
    /// Bits per second of the audio stream, falling back to the container's.
    pub bitrate: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl ProbeInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }

    pub fn bitrate_kbps(&self) -> Option<u32> {
        self.bitrate.map(|b| (b / 1000) as u32)
    }
}
