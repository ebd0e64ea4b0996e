//! # trackwave-av
//!
//! External tool management, probing and transcoding for trackwave.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe,
//!   honouring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Probing** ([`probe`]) -- ffprobe JSON into a [`ProbeInfo`].
//! - **Transcoding** ([`TranscodeEngine`], [`FfmpegEngine`]) -- the two
//!   artifacts of a track: an HLS segment set and an ADTS bitstream.
//! - **Workspace management** ([`Workspace`]) -- scratch directory with
//!   move-into-place finalization.

pub mod command;
pub mod engine;
pub mod error;
pub mod probe;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use engine::{EncodeParams, FfmpegEngine, SegmentSet, TranscodeEngine};
pub use error::{Error, Result};
pub use probe::ProbeInfo;
pub use tools::{ToolInfo, ToolPaths, ToolRegistry};
pub use workspace::Workspace;
