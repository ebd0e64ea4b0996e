//! Trackwave-Media: framed bitstream scanning, seeking, and HLS manifests
//!
//! This crate holds the CPU-bound half of audio delivery. Everything here is
//! synchronous and works on in-memory buffers, so it can run on any worker.
//!
//! # Modules
//!
//! - `adts` - ADTS frame parser, seek calculator, frame statistics and the
//!   constant-bitrate check
//! - `hls` - segment manifest parsing and serve-time URL rewriting
//!
//! # Architecture
//!
//! A track is stored twice after ingestion: as an HLS segment set for
//! progressive playback, and as one continuous ADTS bitstream for the
//! persistent stream. The persistent stream seeks by assuming a constant
//! bitrate:
//!
//! 1. Estimate the byte offset as `seconds * bitrate / 8`
//! 2. Scan forward to the next sync word
//! 3. Walk frames from there, resynchronizing a byte at a time over garbage

pub mod adts;
pub mod error;
pub mod hls;

pub use adts::{
    check_constant_bitrate, estimate_duration, parse_frames, seek, BitrateCheck, Frame,
    FrameBatches, FrameHeader, FrameStats, Frames, SeekPoint,
};
pub use error::{Error, Result};
pub use hls::{HlsFile, SegmentManifest, SegmentRef};
