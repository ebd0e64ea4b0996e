//! HLS segment sets: manifest parsing, serve-time URL rewriting and the file
//! names a track directory may expose.

mod files;
mod manifest;

pub use files::{HlsFile, MANIFEST_FILE, SEGMENT_PATTERN};
pub use manifest::{SegmentManifest, SegmentRef};
