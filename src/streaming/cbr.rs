//! Enforcing the constant-bitrate assumption.

use dashmap::DashMap;
use trackwave_common::TrackId;
use trackwave_media::{check_constant_bitrate, BitrateCheck};

use crate::config::{CbrPolicy, StreamConfig};
use crate::error::{Error, Result};

/// Run the bitrate check on `buf` and apply `policy`.
///
/// Under [`CbrPolicy::Warn`] a variable bitrate is logged and `Ok(None)` is
/// returned; under [`CbrPolicy::Reject`] it is an error. A buffer with no
/// frames is an error under either policy.
pub fn enforce_cbr(
    buf: &[u8],
    assumed_bps: u32,
    policy: CbrPolicy,
    tolerance: f64,
) -> Result<Option<BitrateCheck>> {
    match check_constant_bitrate(buf, assumed_bps, tolerance) {
        Ok(check) => Ok(Some(check)),
        Err(e @ trackwave_media::Error::VariableBitrate { .. }) if policy == CbrPolicy::Warn => {
            tracing::warn!(error = %e, "Bitstream is not constant bitrate; seeks may be imprecise");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Bitrate verdicts per track, so a stored bitstream is measured once per
/// process rather than on every stream request.
#[derive(Debug, Default)]
pub struct CbrVerdicts {
    constant: DashMap<TrackId, bool>,
}

impl CbrVerdicts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the configured policy to the bitstream of `track`.
    ///
    /// CPU-bound on the first call for a track.
    pub fn enforce(&self, track: TrackId, buf: &[u8], config: &StreamConfig) -> Result<()> {
        let constant = match self.constant.get(&track).map(|v| *v) {
            Some(constant) => constant,
            None => {
                let constant = match check_constant_bitrate(
                    buf,
                    config.assumed_bitrate_bps(),
                    config.cbr_tolerance,
                ) {
                    Ok(_) => true,
                    Err(e @ trackwave_media::Error::VariableBitrate { .. }) => {
                        tracing::warn!(
                            track_id = %track,
                            error = %e,
                            "Stored bitstream is not constant bitrate"
                        );
                        false
                    }
                    Err(e) => return Err(e.into()),
                };
                self.constant.insert(track, constant);
                constant
            }
        };

        if !constant && config.cbr_policy == CbrPolicy::Reject {
            return Err(Error::VariableBitrate(format!(
                "track {track} deviates from {} kbit/s",
                config.assumed_bitrate_kbps
            )));
        }
        Ok(())
    }

    /// Drop the verdict for a deleted track.
    pub fn forget(&self, track: TrackId) {
        self.constant.remove(&track);
    }

    pub fn len(&self) -> usize {
        self.constant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constant.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackwave_media::FrameHeader;

    fn stream(lengths: &[usize]) -> Vec<u8> {
        let mut buf = Vec::new();
        for &len in lengths {
            buf.extend_from_slice(&FrameHeader::aac_lc(len as u16).encode());
            buf.resize(buf.len() + len - 7, 0x11);
        }
        buf
    }

    #[test]
    fn test_policy() {
        let mut lengths = vec![120; 431];
        lengths.extend(vec![700; 431]);
        let vbr = stream(&lengths);

        assert!(enforce_cbr(&vbr, 128_000, CbrPolicy::Warn, 0.25)
            .unwrap()
            .is_none());
        assert!(matches!(
            enforce_cbr(&vbr, 128_000, CbrPolicy::Reject, 0.25),
            Err(Error::VariableBitrate(_))
        ));

        let cbr = stream(&[371; 100]);
        assert!(enforce_cbr(&cbr, 128_000, CbrPolicy::Reject, 0.25)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_no_frames_fails_under_warn() {
        assert!(matches!(
            enforce_cbr(&[0u8; 64], 128_000, CbrPolicy::Warn, 0.25),
            Err(Error::FrameSyncNotFound { .. })
        ));
    }

    #[test]
    fn test_verdict_cached_per_track() {
        let mut lengths = vec![120; 431];
        lengths.extend(vec![700; 431]);
        let vbr = stream(&lengths);
        let cbr = stream(&[371; 100]);

        let verdicts = CbrVerdicts::new();
        let warn = StreamConfig::default();
        let reject = StreamConfig {
            cbr_policy: CbrPolicy::Reject,
            ..StreamConfig::default()
        };

        verdicts.enforce(TrackId::from(1), &vbr, &warn).unwrap();
        verdicts.enforce(TrackId::from(2), &cbr, &reject).unwrap();
        assert_eq!(verdicts.len(), 2);

        // The cached verdict is used even when the buffer is not rescanned.
        assert!(matches!(
            verdicts.enforce(TrackId::from(1), &[], &reject),
            Err(Error::VariableBitrate(_))
        ));
        verdicts.enforce(TrackId::from(2), &[], &reject).unwrap();

        verdicts.forget(TrackId::from(1));
        assert_eq!(verdicts.len(), 1);
        assert!(matches!(
            verdicts.enforce(TrackId::from(1), &[0u8; 64], &warn),
            Err(Error::FrameSyncNotFound { .. })
        ));
        assert_eq!(verdicts.len(), 1);
    }
}
