//! On-disk layout of ingested tracks.
//!
//! ```text
//! <media_dir>/<owner>/<track_id>/playlist.m3u8
//!                               /segment<N>.ts
//!                               /track.aac
//! ```

use std::path::{Path, PathBuf};

use trackwave_common::{ListenerId, TrackId};
use trackwave_media::HlsFile;

/// File name of the continuous ADTS bitstream.
pub const BITSTREAM_FILE: &str = "track.aac";

#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn track_dir(&self, owner: &ListenerId, id: TrackId) -> PathBuf {
        self.root.join(owner.as_str()).join(id.to_string())
    }

    pub fn bitstream_path(&self, owner: &ListenerId, id: TrackId) -> PathBuf {
        self.track_dir(owner, id).join(BITSTREAM_FILE)
    }

    /// Path of a whitelisted HLS file. Names come from [`HlsFile`], so the
    /// result never leaves the track directory.
    pub fn hls_path(&self, owner: &ListenerId, id: TrackId, file: &HlsFile) -> PathBuf {
        self.track_dir(owner, id).join(file.file_name())
    }

    /// Remove a track's directory. Missing directories are not an error.
    pub async fn remove_track(&self, owner: &ListenerId, id: TrackId) -> std::io::Result<bool> {
        match tokio::fs::remove_dir_all(self.track_dir(owner, id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
