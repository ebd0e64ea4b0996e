//! Upload to playable artifacts.
//!
//! The record is written before any artifact exists because its id is part
//! of the artifact paths. If producing the artifacts fails afterwards the
//! record is deleted again before the error is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use trackwave_av::{EncodeParams, TranscodeEngine, Workspace};
use trackwave_common::TrackId;
use trackwave_db::models::{NewTrack, Track};
use trackwave_db::MetadataStore;
use trackwave_media::{parse_frames, FrameStats};

use crate::config::{CbrPolicy, Config};
use crate::error::{Error, Result};
use crate::storage::{MediaLayout, BITSTREAM_FILE};
use crate::streaming::enforce_cbr;

/// A finished ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub track: Track,
    /// Directory holding the manifest, segments and bitstream.
    pub dir: PathBuf,
    pub segment_count: usize,
    pub frames: FrameStats,
}

pub struct IngestPipeline {
    store: Arc<dyn MetadataStore>,
    engine: Arc<dyn TranscodeEngine>,
    layout: MediaLayout,
    tmp_dir: PathBuf,
    params: EncodeParams,
    cbr_policy: CbrPolicy,
    cbr_tolerance: f64,
}

impl IngestPipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn MetadataStore>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            store,
            engine,
            layout: MediaLayout::new(config.storage.media_dir()),
            tmp_dir: config.storage.tmp_dir(),
            params: config.ingest.encode_params(),
            cbr_policy: config.stream.cbr_policy,
            cbr_tolerance: config.stream.cbr_tolerance,
        }
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Probe, record, encode and place one upload.
    pub async fn ingest(&self, mut new: NewTrack, data: &[u8]) -> Result<IngestOutcome> {
        if data.is_empty() {
            return Err(Error::invalid_input("empty upload"));
        }

        let workspace = Workspace::new_in(&self.tmp_dir)?;
        let input = workspace.stage(data).await?;
        tracing::debug!(
            workspace = %workspace.temp_dir().display(),
            bytes = data.len(),
            "Staged upload"
        );

        let probe = self.engine.probe(&input).await?;
        tracing::debug!(
            engine = self.engine.name(),
            codec = %probe.codec,
            duration_secs = ?probe.duration_secs(),
            "Probed upload"
        );
        new.duration_secs = probe.duration_secs();
        new.bitrate_kbps = probe.bitrate_kbps();
        new.codec = Some(probe.codec.clone());

        let track = self.store.create_track(&new)?;
        tracing::info!(track_id = %track.id, owner = %track.owner, "Created track record");

        match self.produce(workspace, &input, &track).await {
            Ok((dir, segment_count, frames)) => {
                tracing::info!(
                    track_id = %track.id,
                    segments = segment_count,
                    frames = frames.frame_count,
                    bitrate = ?frames.average_bitrate(),
                    "Ingested track"
                );
                Ok(IngestOutcome {
                    track,
                    dir,
                    segment_count,
                    frames,
                })
            }
            Err(e) => Err(self.roll_back(track.id, e)),
        }
    }

    async fn produce(
        &self,
        workspace: Workspace,
        input: &Path,
        track: &Track,
    ) -> Result<(PathBuf, usize, FrameStats)> {
        let segments = self
            .engine
            .encode_to_segments(input, workspace.output_dir(), &self.params)
            .await?;

        let bitstream_path = workspace.output_file(BITSTREAM_FILE);
        self.engine
            .encode_to_framed_bitstream(input, &bitstream_path, &self.params)
            .await?;

        let bitstream = tokio::fs::read(&bitstream_path).await?;
        parse_frames(&bitstream)?;
        enforce_cbr(
            &bitstream,
            self.params.bitrate_bps(),
            self.cbr_policy,
            self.cbr_tolerance,
        )?;
        let frames = FrameStats::scan(&bitstream);

        let dir = workspace.finalize(self.layout.track_dir(&track.owner, track.id))?;
        Ok((dir, segments.segments.len(), frames))
    }

    /// Delete the record written for a failed ingestion and pick the error
    /// to surface.
    fn roll_back(&self, id: TrackId, cause: Error) -> Error {
        tracing::warn!(track_id = %id, error = %cause, "Ingestion failed, removing track record");
        match self.store.delete_track(id) {
            Ok(_) => cause,
            Err(e) => {
                tracing::error!(track_id = %id, error = %e, "Rollback of track record failed");
                Error::MetadataInconsistency(format!(
                    "track {id} left without artifacts after '{cause}': {e}"
                ))
            }
        }
    }

    /// Remove a track's record and its artifacts.
    pub async fn delete(&self, id: TrackId) -> Result<Track> {
        let track = self
            .store
            .get_track(id)?
            .ok_or_else(|| Error::not_found(format!("track {id}")))?;

        if !self.store.delete_track(id)? {
            return Err(Error::not_found(format!("track {id}")));
        }
        if let Err(e) = self.layout.remove_track(&track.owner, id).await {
            tracing::warn!(track_id = %id, error = %e, "Failed to remove track artifacts");
        }
        tracing::info!(track_id = %id, "Deleted track");
        Ok(track)
    }
}
