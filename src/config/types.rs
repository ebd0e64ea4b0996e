use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use trackwave_av::{EncodeParams, ToolPaths};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub plays: PlaysConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin clients reach the server at, used when rewriting manifests.
    /// Relative URLs are served when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Holds the database file and the `media/` tree.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("trackwave.db")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    /// Scratch space on the same filesystem as `media_dir`.
    pub fn tmp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Constant bitrate of both artifacts (kbit/s).
    #[serde(default = "default_bitrate_kbps")]
    pub target_bitrate_kbps: u32,

    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u32,

    /// Concurrent encoder runs; defaults to the number of CPUs.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Limit for each ffmpeg/ffprobe run.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bitrate_kbps() -> u32 {
    128
}
fn default_segment_seconds() -> u32 {
    1
}
fn default_max_concurrent_jobs() -> usize {
    num_cpus::get()
}
fn default_tool_timeout_secs() -> u64 {
    600
}
fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            target_bitrate_kbps: default_bitrate_kbps(),
            segment_seconds: default_segment_seconds(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl IngestConfig {
    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            bitrate_kbps: self.target_bitrate_kbps,
            segment_seconds: self.segment_seconds,
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// What to do when a bitstream is not close enough to constant bitrate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CbrPolicy {
    /// Log and carry on; seeks may land imprecisely.
    #[default]
    Warn,
    /// Fail the ingestion or stream request.
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Frames per transport message.
    #[serde(default = "default_batch_frames")]
    pub batch_frames: usize,

    /// Bitrate used for seek arithmetic and the duration estimate (kbit/s).
    #[serde(default = "default_bitrate_kbps")]
    pub assumed_bitrate_kbps: u32,

    #[serde(default)]
    pub cbr_policy: CbrPolicy,

    /// Allowed relative deviation from the assumed bitrate.
    #[serde(default = "default_cbr_tolerance")]
    pub cbr_tolerance: f64,
}

fn default_batch_frames() -> usize {
    200
}
fn default_cbr_tolerance() -> f64 {
    0.25
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_frames: default_batch_frames(),
            assumed_bitrate_kbps: default_bitrate_kbps(),
            cbr_policy: CbrPolicy::default(),
            cbr_tolerance: default_cbr_tolerance(),
        }
    }
}

impl StreamConfig {
    pub fn assumed_bitrate_bps(&self) -> u32 {
        self.assumed_bitrate_kbps * 1000
    }
}

/// Which confirmation rule a delivery mode feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmRule {
    /// Count more than `tick_threshold` progress signals.
    Ticks,
    /// Require `long_listen_secs` of wall-clock time since the last play.
    WallClock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaysConfig {
    #[serde(default = "default_tick_threshold")]
    pub tick_threshold: u32,

    #[serde(default = "default_long_listen_secs")]
    pub long_listen_secs: u64,

    /// Armed entries untouched for longer than this are reset by the sweep.
    #[serde(default = "default_idle_reset_secs")]
    pub idle_reset_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum (listener, track) entries kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Rule fed by the persistent stream's "still playing" marker.
    #[serde(default = "default_stream_rule")]
    pub stream_rule: ConfirmRule,

    /// Rule fed by HLS segment fetches.
    #[serde(default = "default_segment_rule")]
    pub segment_rule: ConfirmRule,
}

fn default_tick_threshold() -> u32 {
    7
}
fn default_long_listen_secs() -> u64 {
    55
}
fn default_idle_reset_secs() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    10
}
fn default_capacity() -> usize {
    100_000
}
fn default_stream_rule() -> ConfirmRule {
    ConfirmRule::WallClock
}
fn default_segment_rule() -> ConfirmRule {
    ConfirmRule::Ticks
}

impl Default for PlaysConfig {
    fn default() -> Self {
        Self {
            tick_threshold: default_tick_threshold(),
            long_listen_secs: default_long_listen_secs(),
            idle_reset_secs: default_idle_reset_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            capacity: default_capacity(),
            stream_rule: default_stream_rule(),
            segment_rule: default_segment_rule(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            ffmpeg: self.ffmpeg_path.clone(),
            ffprobe: self.ffprobe_path.clone(),
        }
    }
}
