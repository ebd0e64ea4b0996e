//! One streaming session: seek, then push frame batches while reading
//! control signals.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use trackwave_media::{estimate_duration, seek, FrameBatches, Frames};

use super::registry::SessionRegistration;
use super::transport::{ControlChannel, ControlSignal, FrameSink, StreamMetadata};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::plays::PlayCounter;

/// A bitstream positioned at the requested start.
#[derive(Debug, Clone)]
pub struct PreparedStream {
    /// Sub-buffer starting at the frame the seek landed on.
    pub data: Bytes,
    /// Byte offset of `data` within the whole bitstream.
    pub offset: usize,
    pub metadata: StreamMetadata,
}

/// Seek `bitstream` to `start_secs` and check a frame starts there.
///
/// Fails with `SeekOutOfRange` past the estimated end and with
/// `FrameSyncNotFound` when no frame follows the landing point. The bitrate
/// policy is applied separately, see [`CbrVerdicts`](super::CbrVerdicts).
pub fn prepare_stream(
    bitstream: Bytes,
    start_secs: f64,
    config: &StreamConfig,
) -> Result<PreparedStream> {
    let bitrate = config.assumed_bitrate_bps();

    let duration_secs = estimate_duration(bitstream.len(), bitrate)?;
    let offset = seek(&bitstream, start_secs, bitrate)?.offset;
    let data = bitstream.slice(offset..);

    let mut frames = Frames::new(&data);
    if frames.next().is_none() {
        return Err(Error::FrameSyncNotFound {
            scanned: data.len(),
        });
    }

    Ok(PreparedStream {
        data,
        offset,
        metadata: StreamMetadata {
            duration_secs,
            start_secs,
        },
    })
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every frame was sent.
    Completed,
    /// The client sent "finish".
    Finished,
    /// The client closed its side.
    ClientClosed,
    /// The session was cancelled from outside, e.g. on shutdown.
    Cancelled,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub batches_sent: usize,
    pub frames_sent: usize,
    pub bytes_sent: usize,
    pub still_playing_signals: usize,
    pub reason: EndReason,
}

#[derive(Debug, Default)]
struct SendProgress {
    batches: usize,
    frames: usize,
    bytes: usize,
}

/// Run a session to completion.
///
/// The sender and the control reader run concurrently and share the
/// registration's cancellation token: whichever side finishes first, by end
/// of data, "finish", a closed client or a transport error, cancels the
/// other. A transport error on either side is returned after both stopped.
pub async fn run_session<S, C>(
    mut registration: SessionRegistration,
    stream: PreparedStream,
    batch_frames: usize,
    plays: &PlayCounter,
    mut sink: S,
    mut control: C,
) -> Result<SessionOutcome>
where
    S: FrameSink,
    C: ControlChannel,
{
    let cancel = registration.cancel.clone();
    let opened = registration.opened;
    let listener = registration.listener.clone();
    let track = registration.track;
    let session_id = registration.id;
    let events = &mut registration.events;

    let sender = async {
        let result = send_batches(&mut sink, &stream, batch_frames, events, &cancel).await;
        cancel.cancel();
        if let Err(e) = sink.close().await {
            tracing::debug!(session_id = %session_id, error = %e, "Failed to close stream sink");
        }
        result
    };

    let reader = async {
        let result = read_control(&mut control, &cancel, || {
            plays.still_playing(&listener, track, opened);
        })
        .await;
        cancel.cancel();
        result
    };

    let (sent, read) = tokio::join!(sender, reader);
    let (progress, completed) = sent?;
    let (signal_end, still_playing_signals) = read?;

    let reason = match signal_end {
        Some(reason) => reason,
        None if completed => EndReason::Completed,
        None => EndReason::Cancelled,
    };

    let outcome = SessionOutcome {
        batches_sent: progress.batches,
        frames_sent: progress.frames,
        bytes_sent: progress.bytes,
        still_playing_signals,
        reason,
    };
    tracing::debug!(
        session_id = %session_id,
        batches = outcome.batches_sent,
        frames = outcome.frames_sent,
        reason = ?outcome.reason,
        "Stream session ended"
    );
    Ok(outcome)
}

/// Push metadata then every batch. Returns progress and whether all data
/// went out before cancellation.
async fn send_batches<S: FrameSink>(
    sink: &mut S,
    stream: &PreparedStream,
    batch_frames: usize,
    events: &mut tokio::sync::mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> Result<(SendProgress, bool)> {
    let mut progress = SendProgress::default();

    tokio::select! {
        _ = cancel.cancelled() => return Ok((progress, false)),
        r = sink.send_metadata(&stream.metadata) => r?,
    }

    for batch in FrameBatches::new(&stream.data, batch_frames) {
        while let Ok(event) = events.try_recv() {
            tokio::select! {
                _ = cancel.cancelled() => return Ok((progress, false)),
                r = sink.send_event(event) => r?,
            }
        }

        let len = batch.data.len();
        tokio::select! {
            _ = cancel.cancelled() => return Ok((progress, false)),
            r = sink.send_batch(batch.data) => r?,
        }
        progress.batches += 1;
        progress.frames += batch.frame_count;
        progress.bytes += len;
    }

    Ok((progress, !cancel.is_cancelled()))
}

/// Read control signals until "finish", a closed client, an error or
/// cancellation. Returns the end reason it caused, if any, and how many
/// "still playing" signals arrived.
async fn read_control<C: ControlChannel>(
    control: &mut C,
    cancel: &CancellationToken,
    mut on_still_playing: impl FnMut(),
) -> Result<(Option<EndReason>, usize)> {
    let mut still_playing = 0;
    loop {
        let signal = tokio::select! {
            _ = cancel.cancelled() => return Ok((None, still_playing)),
            signal = control.recv() => signal?,
        };
        match signal {
            Some(ControlSignal::StillPlaying) => {
                still_playing += 1;
                on_still_playing();
            }
            Some(ControlSignal::Finished) => {
                return Ok((Some(EndReason::Finished), still_playing));
            }
            None => return Ok((Some(EndReason::ClientClosed), still_playing)),
        }
    }
}
