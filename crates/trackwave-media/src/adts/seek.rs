//! Constant-bitrate seek.
//!
//! The byte offset for a time is estimated as `seconds * bitrate / 8` and the
//! scan then moves forward to the next sync word, or back to the previous one
//! near the end of the buffer. For CBR input the landing point is within one
//! frame of the requested time. VBR input lands wherever
//! the average says; use [`check_constant_bitrate`](super::check_constant_bitrate)
//! to detect that case up front.

use super::header::{frame_length_at, is_sync, MAX_FRAME_LEN};
use crate::error::{Error, Result};

/// Estimated playback duration of `len` bytes at `bitrate_bps`.
pub fn estimate_duration(len: usize, bitrate_bps: u32) -> Result<f64> {
    if bitrate_bps == 0 {
        return Err(Error::InvalidBitrate(bitrate_bps));
    }
    Ok(len as f64 * 8.0 / bitrate_bps as f64)
}

/// Where a seek landed.
#[derive(Debug, Clone, Copy)]
pub struct SeekPoint<'a> {
    pub requested_secs: f64,
    /// `requested_secs * bitrate / 8`, before aligning to a sync word.
    pub estimated_offset: usize,
    /// Offset of the sync word the seek landed on.
    pub offset: usize,
    /// The buffer from `offset` to the end.
    pub data: &'a [u8],
}

impl SeekPoint<'_> {
    /// Distance between the estimate and the landing point.
    pub fn drift(&self) -> usize {
        self.offset.abs_diff(self.estimated_offset)
    }
}

/// Locate the first sync word at or after the estimated offset for `seconds`.
///
/// When nothing follows the estimate, the frame containing it is used
/// instead.
///
/// Only the sync word is checked, not the frame length; the parser will
/// resynchronize if the landing point turns out to be a false sync.
pub fn seek(buf: &[u8], seconds: f64, bitrate_bps: u32) -> Result<SeekPoint<'_>> {
    let duration = estimate_duration(buf.len(), bitrate_bps)?;
    if !seconds.is_finite() || seconds < 0.0 || seconds >= duration {
        return Err(Error::SeekOutOfRange {
            requested: seconds,
            duration,
        });
    }

    let estimated_offset = ((seconds * bitrate_bps as f64 / 8.0) as usize).min(buf.len());
    let offset = (estimated_offset..buf.len().saturating_sub(1))
        .find(|&pos| is_sync(buf, pos))
        .or_else(|| {
            // The estimate fell inside the last frame.
            let floor = estimated_offset.saturating_sub(MAX_FRAME_LEN);
            (floor..estimated_offset).rev().find(|&pos| {
                frame_length_at(buf, pos).is_some_and(|len| pos + len > estimated_offset)
            })
        })
        .ok_or(Error::FrameSyncNotFound {
            scanned: buf.len() - estimated_offset,
        })?;

    Ok(SeekPoint {
        requested_secs: seconds,
        estimated_offset,
        offset,
        data: &buf[offset..],
    })
}
