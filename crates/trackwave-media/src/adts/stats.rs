//! Frame statistics and the constant-bitrate check.

use super::parser::Frames;
use crate::error::{Error, Result};

/// Aggregate figures for a scanned bitstream.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameStats {
    pub frame_count: usize,
    /// Bytes covered by frames.
    pub total_bytes: usize,
    /// Bytes stepped over while resynchronizing.
    pub skipped_bytes: usize,
    /// Sampling rate of the first frame.
    pub sample_rate: Option<u32>,
    pub channel_config: Option<u8>,
    pub profile: Option<u8>,
    pub total_samples: u64,
    /// Sum of per-frame durations.
    pub duration_secs: f64,
}

impl FrameStats {
    /// Walk every frame in `buf`.
    pub fn scan(buf: &[u8]) -> Self {
        let mut stats = Self::default();
        let mut frames = Frames::new(buf);
        for frame in frames.by_ref() {
            let header = frame.header();
            if stats.frame_count == 0 {
                stats.sample_rate = header.sample_rate();
                stats.channel_config = Some(header.channel_config);
                stats.profile = Some(header.profile);
            }
            stats.frame_count += 1;
            stats.total_bytes += frame.len();
            stats.total_samples += header.samples() as u64;
            stats.duration_secs += header.duration_secs().unwrap_or(0.0);
        }
        stats.skipped_bytes = frames.skipped_bytes();
        stats
    }

    /// Average bitrate over the whole stream, if it has any duration.
    pub fn average_bitrate(&self) -> Option<f64> {
        (self.duration_secs > 0.0).then(|| self.total_bytes as f64 * 8.0 / self.duration_secs)
    }
}

/// Result of a passed constant-bitrate check.
#[derive(Debug, Clone, PartialEq)]
pub struct BitrateCheck {
    pub stats: FrameStats,
    pub assumed_bps: u32,
    /// Bitrate of each complete one-second window.
    pub window_bps: Vec<f64>,
    /// Largest relative deviation from `assumed_bps` seen in any window.
    pub max_deviation: f64,
}

/// Verify that `buf` is close enough to `assumed_bps` for byte-offset seeking.
///
/// The stream is cut into windows of one second of audio and each window's
/// bitrate is compared with the assumed one. Streams shorter than a second
/// are judged on their overall average. Fails with [`Error::VariableBitrate`]
/// when any window deviates by more than `tolerance` (a fraction, so 0.25
/// allows 25%), and with [`Error::FrameSyncNotFound`] when there are no frames.
pub fn check_constant_bitrate(
    buf: &[u8],
    assumed_bps: u32,
    tolerance: f64,
) -> Result<BitrateCheck> {
    if assumed_bps == 0 {
        return Err(Error::InvalidBitrate(assumed_bps));
    }

    let mut window_bps = Vec::new();
    let (mut window_bytes, mut window_secs) = (0usize, 0.0f64);
    for frame in Frames::new(buf) {
        window_bytes += frame.len();
        window_secs += frame.header().duration_secs().unwrap_or(0.0);
        if window_secs >= 1.0 {
            window_bps.push(window_bytes as f64 * 8.0 / window_secs);
            window_bytes = 0;
            window_secs = 0.0;
        }
    }

    let stats = FrameStats::scan(buf);
    if stats.frame_count == 0 {
        return Err(Error::FrameSyncNotFound { scanned: buf.len() });
    }
    if window_bps.is_empty() {
        window_bps.push(stats.average_bitrate().unwrap_or(0.0));
    }

    let assumed = assumed_bps as f64;
    let (worst_bps, max_deviation) = window_bps
        .iter()
        .map(|&bps| (bps, (bps - assumed).abs() / assumed))
        .fold((assumed, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

    if max_deviation > tolerance {
        return Err(Error::VariableBitrate {
            assumed_bps,
            measured_bps: worst_bps,
            deviation: max_deviation,
        });
    }

    Ok(BitrateCheck {
        stats,
        assumed_bps,
        window_bps,
        max_deviation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adts::parser::tests::stream;

    // 128 kbps at 44.1 kHz with 1024 samples per frame.
    const CBR_FRAME: usize = 371;

    #[test]
    fn test_scan_stats() {
        let mut buf = vec![0u8; 3];
        buf.extend(stream(&[CBR_FRAME; 43]));
        let stats = FrameStats::scan(&buf);
        assert_eq!(stats.frame_count, 43);
        assert_eq!(stats.total_bytes, 43 * CBR_FRAME);
        assert_eq!(stats.skipped_bytes, 3);
        assert_eq!(stats.sample_rate, Some(44100));
        assert_eq!(stats.channel_config, Some(2));
        assert_eq!(stats.profile, Some(1));
        assert_eq!(stats.total_samples, 43 * 1024);
        assert!((stats.duration_secs - 43.0 * 1024.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_bitrate_passes() {
        let buf = stream(&[CBR_FRAME; 431]);
        let check = check_constant_bitrate(&buf, 128_000, 0.05).unwrap();
        assert_eq!(check.window_bps.len(), 9);
        assert!(check.max_deviation < 0.01);
    }

    #[test]
    fn test_short_stream_uses_average() {
        let buf = stream(&[CBR_FRAME; 10]);
        let check = check_constant_bitrate(&buf, 128_000, 0.05).unwrap();
        assert_eq!(check.window_bps.len(), 1);
    }

    #[test]
    fn test_variable_bitrate_rejected() {
        // Ten quiet seconds then ten loud ones.
        let mut lengths = vec![120; 431];
        lengths.extend(vec![700; 431]);
        let buf = stream(&lengths);
        match check_constant_bitrate(&buf, 128_000, 0.25) {
            Err(Error::VariableBitrate { deviation, .. }) => assert!(deviation > 0.25),
            other => panic!("expected VariableBitrate, got {other:?}"),
        }
    }

    #[test]
    fn test_no_frames() {
        assert!(matches!(
            check_constant_bitrate(&[0u8; 500], 128_000, 0.25),
            Err(Error::FrameSyncNotFound { .. })
        ));
        assert!(matches!(
            check_constant_bitrate(&[0u8; 500], 0, 0.25),
            Err(Error::InvalidBitrate(0))
        ));
    }
}
