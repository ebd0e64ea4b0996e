//! Transcoding engine abstraction and the ffmpeg implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use trackwave_media::hls::{HlsFile, MANIFEST_FILE, SEGMENT_PATTERN};

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};
use crate::probe::{probe_with_ffprobe, ProbeInfo};
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Target parameters for both artifacts of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    /// Constant target bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Target HLS segment length in seconds.
    pub segment_seconds: u32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            segment_seconds: 1,
        }
    }
}

impl EncodeParams {
    pub fn bitrate_bps(&self) -> u32 {
        self.bitrate_kbps * 1000
    }
}

/// Files produced by [`TranscodeEngine::encode_to_segments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSet {
    pub manifest: PathBuf,
    /// Segment files ordered by index.
    pub segments: Vec<PathBuf>,
}

impl SegmentSet {
    /// Collect the manifest and segment files present in `dir`.
    pub fn scan(dir: &Path) -> Result<Self> {
        let manifest = dir.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(Error::tool_failed(
                "ffmpeg",
                format!("no {MANIFEST_FILE} in {}", dir.display()),
            ));
        }

        let mut indexed = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Ok(HlsFile::Segment(n)) = HlsFile::parse(&name.to_string_lossy()) {
                indexed.push((n, entry.path()));
            }
        }
        indexed.sort_by_key(|(n, _)| *n);

        Ok(Self {
            manifest,
            segments: indexed.into_iter().map(|(_, p)| p).collect(),
        })
    }
}

/// Probing and encoding capability used by the ingestion pipeline.
///
/// [`FfmpegEngine`] shells out to ffmpeg/ffprobe; tests substitute an
/// in-process implementation.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Inspect the input. Fails with [`Error::NoAudioStream`] when there is
    /// nothing to encode.
    async fn probe(&self, input: &Path) -> Result<ProbeInfo>;

    /// Write `playlist.m3u8` and `segment<N>.ts` files into `out_dir`.
    async fn encode_to_segments(
        &self,
        input: &Path,
        out_dir: &Path,
        params: &EncodeParams,
    ) -> Result<SegmentSet>;

    /// Write one continuous ADTS bitstream to `output`.
    async fn encode_to_framed_bitstream(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> Result<()>;
}

/// [`TranscodeEngine`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    tools: ToolRegistry,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Limit for each ffmpeg/ffprobe invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn ffmpeg(&self, input: &Path) -> Result<ToolCommand> {
        let mut cmd = ToolCommand::new(self.tools.require("ffmpeg")?.to_path_buf());
        cmd.timeout(self.timeout);
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"]);
        cmd.path_arg(input);
        Ok(cmd)
    }
}

/// Arguments for a constant-bitrate AAC encode with video dropped.
fn aac_args(params: &EncodeParams) -> Vec<String> {
    vec![
        "-vn".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", params.bitrate_kbps),
    ]
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe(&self, input: &Path) -> Result<ProbeInfo> {
        let ffprobe = self.tools.require("ffprobe")?;
        probe_with_ffprobe(ffprobe, input, self.timeout).await
    }

    async fn encode_to_segments(
        &self,
        input: &Path,
        out_dir: &Path,
        params: &EncodeParams,
    ) -> Result<SegmentSet> {
        tokio::fs::create_dir_all(out_dir).await?;

        tracing::info!(
            input = %input.display(),
            out_dir = %out_dir.display(),
            segment_seconds = params.segment_seconds,
            bitrate_kbps = params.bitrate_kbps,
            "Encoding HLS segments"
        );

        let mut cmd = self.ffmpeg(input)?;
        cmd.args(aac_args(params));
        cmd.args(["-f", "hls", "-hls_time"]);
        cmd.arg(params.segment_seconds.to_string());
        cmd.args([
            "-hls_list_size",
            "0",
            "-hls_flags",
            "split_by_time",
            "-hls_segment_type",
            "mpegts",
            "-hls_playlist_type",
            "vod",
            "-hls_segment_filename",
        ]);
        cmd.path_arg(&out_dir.join(SEGMENT_PATTERN));
        cmd.path_arg(&out_dir.join(MANIFEST_FILE));
        cmd.execute().await?;

        SegmentSet::scan(out_dir)
    }

    async fn encode_to_framed_bitstream(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> Result<()> {
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            bitrate_kbps = params.bitrate_kbps,
            "Encoding ADTS bitstream"
        );

        let mut cmd = self.ffmpeg(input)?;
        cmd.args(aac_args(params));
        cmd.args(["-f", "adts"]);
        cmd.path_arg(output);
        cmd.execute().await?;
        Ok(())
    }
}
