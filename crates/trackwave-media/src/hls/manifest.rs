//! Media playlist parsing and rewriting.

use crate::error::{Error, Result};

/// One `#EXTINF` entry of a media playlist.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentRef {
    pub uri: String,
    pub duration: f64,
}

/// A parsed media playlist as written by the encoder.
///
/// The stored playlist only carries bare segment names. A base URL is applied
/// when the playlist is served, so the stored file never embeds a host or any
/// per-request authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentManifest {
    text: String,
    pub target_duration: Option<u32>,
    pub segments: Vec<SegmentRef>,
    pub ended: bool,
}

impl SegmentManifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some("#EXTM3U") {
            return Err(Error::invalid_manifest("missing #EXTM3U header"));
        }

        let mut target_duration = None;
        let mut segments = Vec::new();
        let mut ended = false;
        let mut pending: Option<f64> = None;

        for line in lines {
            if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                target_duration = Some(value.parse().map_err(|_| {
                    Error::invalid_manifest(format!("bad target duration: {value:?}"))
                })?);
            } else if let Some(value) = line.strip_prefix("#EXTINF:") {
                let secs = value.split(',').next().unwrap_or_default();
                pending = Some(secs.parse().map_err(|_| {
                    Error::invalid_manifest(format!("bad segment duration: {secs:?}"))
                })?);
            } else if line == "#EXT-X-ENDLIST" {
                ended = true;
            } else if !line.starts_with('#') {
                let duration = pending.take().ok_or_else(|| {
                    Error::invalid_manifest(format!("segment {line:?} has no #EXTINF"))
                })?;
                segments.push(SegmentRef {
                    uri: line.to_string(),
                    duration,
                });
            }
        }

        Ok(Self {
            text: text.to_string(),
            target_duration,
            segments,
            ended,
        })
    }

    /// Sum of all segment durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// The playlist with every segment line prefixed by `base_url`.
    ///
    /// Tags and comments are passed through untouched.
    pub fn rewrite(&self, base_url: &str) -> String {
        self.rewrite_with_query(base_url, None)
    }

    /// Like [`rewrite`](Self::rewrite), also appending `?query` to every
    /// segment line.
    pub fn rewrite_with_query(&self, base_url: &str, query: Option<&str>) -> String {
        let base = base_url.trim_end_matches('/');
        let mut out = String::with_capacity(self.text.len() + self.segments.len() * base.len());
        for line in self.text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                out.push_str(line);
            } else {
                out.push_str(base);
                out.push('/');
                out.push_str(trimmed);
                if let Some(query) = query.filter(|q| !q.is_empty()) {
                    out.push('?');
                    out.push_str(query);
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:1
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXTINF:1.021333,
segment0.ts
#EXTINF:0.998000,
segment1.ts
#EXTINF:0.480000,
segment2.ts
#EXT-X-ENDLIST
";

    #[test]
    fn test_parse_playlist() {
        let manifest = SegmentManifest::parse(PLAYLIST).unwrap();
        assert_eq!(manifest.target_duration, Some(1));
        assert!(manifest.ended);
        let uris: Vec<_> = manifest.segments.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, ["segment0.ts", "segment1.ts", "segment2.ts"]);
        assert!((manifest.total_duration() - 2.499333).abs() < 1e-9);
    }

    #[test]
    fn test_rewrite_prefixes_segments_only() {
        let manifest = SegmentManifest::parse(PLAYLIST).unwrap();
        let rewritten = manifest.rewrite("https://cdn.example/api/hls/7/");
        assert!(rewritten.contains("\nhttps://cdn.example/api/hls/7/segment0.ts\n"));
        assert!(rewritten.contains("\nhttps://cdn.example/api/hls/7/segment2.ts\n"));
        assert!(rewritten.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(rewritten.ends_with("#EXT-X-ENDLIST\n"));
        assert_eq!(
            rewritten.lines().count(),
            PLAYLIST.lines().count(),
            "rewrite must not add or drop lines"
        );

        // The stored playlist is untouched.
        assert!(manifest.as_str().contains("\nsegment0.ts\n"));
    }

    #[test]
    fn test_rewrite_with_query() {
        let manifest = SegmentManifest::parse(PLAYLIST).unwrap();
        let rewritten = manifest.rewrite_with_query("/api/hls/7", Some("listener=alice"));
        assert!(rewritten.contains("\n/api/hls/7/segment1.ts?listener=alice\n"));
        assert!(!rewritten.contains("#EXTM3U?"));
        assert_eq!(manifest.rewrite_with_query("/x", Some("")), manifest.rewrite("/x"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SegmentManifest::parse("").is_err());
        assert!(SegmentManifest::parse("segment0.ts\n").is_err());
        assert!(SegmentManifest::parse("#EXTM3U\nsegment0.ts\n").is_err());
        assert!(SegmentManifest::parse("#EXTM3U\n#EXTINF:abc,\nsegment0.ts\n").is_err());
    }
}
