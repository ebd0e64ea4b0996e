//! Error types for trackwave-media.

use thiserror::Error;

/// Result type for trackwave-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for trackwave-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No valid frame was found anywhere in the scanned buffer.
    #[error("Frame sync not found in {scanned} bytes")]
    FrameSyncNotFound { scanned: usize },

    /// The requested offset lies at or beyond the estimated duration.
    #[error("Seek to {requested:.3}s is out of range (duration {duration:.3}s)")]
    SeekOutOfRange { requested: f64, duration: f64 },

    /// A bitrate of zero cannot be used for offset arithmetic.
    #[error("Invalid bitrate: {0} bps")]
    InvalidBitrate(u32),

    /// The measured bitrate strays too far from the assumed constant bitrate.
    #[error("Variable bitrate: assumed {assumed_bps} bps, measured {measured_bps:.0} bps ({deviation:.2} deviation)")]
    VariableBitrate {
        assumed_bps: u32,
        measured_bps: f64,
        deviation: f64,
    },

    /// The segment manifest could not be parsed.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
}

impl Error {
    /// Create an invalid manifest error.
    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }
}
