//! File names inside a track's HLS directory.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Name of the manifest written by the encoder.
pub const MANIFEST_FILE: &str = "playlist.m3u8";

/// Pattern handed to the encoder for segment file names.
pub const SEGMENT_PATTERN: &str = "segment%d.ts";

/// A file that may be served from a track's HLS directory.
///
/// Parsing is a whitelist: anything that is not exactly `playlist.m3u8` or
/// `segment<N>.ts` is rejected, so the value is always safe to join onto a
/// directory path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HlsFile {
    Manifest,
    Segment(u32),
}

impl HlsFile {
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Manifest => "application/vnd.apple.mpegurl",
            Self::Segment(_) => "video/mp2t",
        }
    }

    /// Manifests are revalidated on every fetch; segments are never cached.
    pub fn cache_control(&self) -> &'static str {
        match self {
            Self::Manifest => "no-cache",
            Self::Segment(_) => "no-store",
        }
    }

    pub fn is_segment(&self) -> bool {
        matches!(self, Self::Segment(_))
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl FromStr for HlsFile {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        if name == MANIFEST_FILE {
            return Ok(Self::Manifest);
        }
        name.strip_prefix("segment")
            .and_then(|rest| rest.strip_suffix(".ts"))
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse().ok())
            .map(Self::Segment)
            .ok_or_else(|| Error::invalid_manifest(format!("not an HLS file name: {name:?}")))
    }
}

impl fmt::Display for HlsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest => f.write_str(MANIFEST_FILE),
            Self::Segment(n) => write!(f, "segment{n}.ts"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whitelist() {
        assert_eq!(HlsFile::parse("playlist.m3u8").unwrap(), HlsFile::Manifest);
        assert_eq!(HlsFile::parse("segment0.ts").unwrap(), HlsFile::Segment(0));
        assert_eq!(HlsFile::parse("segment417.ts").unwrap(), HlsFile::Segment(417));

        for bad in [
            "",
            "segment.ts",
            "segment-1.ts",
            "segment1.ts.bak",
            "../segment1.ts",
            "segment1.mp4",
            "other.m3u8",
            "segment99999999999.ts",
        ] {
            assert!(HlsFile::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_headers_differ() {
        let manifest = HlsFile::Manifest;
        let segment = HlsFile::Segment(3);
        assert_eq!(manifest.content_type(), "application/vnd.apple.mpegurl");
        assert_eq!(manifest.cache_control(), "no-cache");
        assert_eq!(segment.content_type(), "video/mp2t");
        assert_eq!(segment.cache_control(), "no-store");
        assert!(segment.is_segment());
        assert_eq!(segment.file_name(), "segment3.ts");
    }
}
