//! Error taxonomy for track delivery.
//!
//! Library crates keep their own error enums; everything is folded into
//! [`Error`] at this level so handlers and the CLI see one type.

/// Result type alias using the trackwave Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An encoder or prober failed, or produced output that cannot be used.
    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),

    #[error("No audio stream in upload: {0}")]
    NoAudioStream(String),

    #[error("Frame sync not found in {scanned} bytes")]
    FrameSyncNotFound { scanned: usize },

    #[error("Seek to {requested:.3}s is out of range (duration {duration:.3}s)")]
    SeekOutOfRange { requested: f64, duration: f64 },

    /// Sending to or receiving from a stream client failed.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Metadata was left without artifacts, or the rollback itself failed.
    #[error("Metadata inconsistency: {0}")]
    MetadataInconsistency(String),

    #[error("Bitstream is not constant bitrate: {0}")]
    VariableBitrate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn ingestion<S: Into<String>>(msg: S) -> Self {
        Self::IngestionFailure(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportFailure(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoAudioStream(_) | Self::VariableBitrate(_) => 422,
            Self::InvalidInput(_) => 400,
            Self::SeekOutOfRange { .. } => 416,
            Self::NotFound(_) => 404,
            Self::TransportFailure(_) => 502,
            Self::FrameSyncNotFound { .. }
            | Self::IngestionFailure(_)
            | Self::MetadataInconsistency(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IngestionFailure(_) => "ingestion_failure",
            Self::NoAudioStream(_) => "no_audio_stream",
            Self::FrameSyncNotFound { .. } => "frame_sync_not_found",
            Self::SeekOutOfRange { .. } => "seek_out_of_range",
            Self::TransportFailure(_) => "transport_failure",
            Self::MetadataInconsistency(_) => "metadata_inconsistency",
            Self::VariableBitrate(_) => "variable_bitrate",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<trackwave_media::Error> for Error {
    fn from(e: trackwave_media::Error) -> Self {
        use trackwave_media::Error as M;
        match e {
            M::FrameSyncNotFound { scanned } => Self::FrameSyncNotFound { scanned },
            M::SeekOutOfRange {
                requested,
                duration,
            } => Self::SeekOutOfRange {
                requested,
                duration,
            },
            e @ M::VariableBitrate { .. } => Self::VariableBitrate(e.to_string()),
            e @ M::InvalidBitrate(_) => Self::InvalidInput(e.to_string()),
            e @ M::InvalidManifest(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<trackwave_av::Error> for Error {
    fn from(e: trackwave_av::Error) -> Self {
        use trackwave_av::Error as A;
        match e {
            A::NoAudioStream { path } => Self::NoAudioStream(path.display().to_string()),
            A::InvalidInput(msg) => Self::InvalidInput(msg),
            A::Io(e) => Self::Io(e),
            e @ (A::ToolNotFound { .. }
            | A::ToolFailed { .. }
            | A::ParseError { .. }
            | A::Json(_)
            | A::Workspace(_)) => Self::IngestionFailure(e.to_string()),
        }
    }
}

impl From<trackwave_common::Error> for Error {
    fn from(e: trackwave_common::Error) -> Self {
        use trackwave_common::Error as C;
        match e {
            C::NotFound(msg) => Self::NotFound(msg),
            C::InvalidInput(msg) => Self::InvalidInput(msg),
            C::Database(msg) => Self::Database(msg),
            C::Io(e) => Self::Io(e),
            C::Internal(msg) => Self::Internal(msg),
        }
    }
}
