//! Linear frame scanner with byte-wise resynchronization.

use super::header::{frame_length_at, FrameHeader, HEADER_SIZE};
use crate::error::{Error, Result};

/// One frame located in a bitstream buffer.
///
/// A view into the scanned buffer; nothing is copied until a batch is built
/// for transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Byte offset of the frame within the scanned buffer.
    pub start: usize,
    /// The whole frame, header included.
    pub bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last byte of the frame.
    pub fn end(&self) -> usize {
        self.start + self.bytes.len()
    }

    /// Decoded header of this frame.
    pub fn header(&self) -> FrameHeader {
        // A Frame is only built after frame_length_at accepted the header.
        FrameHeader::parse(self.bytes).unwrap_or_else(|| FrameHeader::aac_lc(self.len() as u16))
    }
}

/// Lazy iterator over the frames of a buffer.
///
/// On a valid header the cursor jumps by the declared frame length, so sync
/// patterns that happen to occur inside a payload are never examined. On an
/// invalid header the cursor moves one byte and tries again. Cloning gives an
/// independent cursor over the same buffer.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    pos: usize,
    skipped: usize,
}

impl<'a> Frames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            skipped: 0,
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes stepped over during resynchronization so far.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped
    }

    /// Rewind to the start of the buffer.
    pub fn restart(&mut self) {
        self.pos = 0;
        self.skipped = 0;
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos + HEADER_SIZE < self.buf.len() {
            match frame_length_at(self.buf, self.pos) {
                Some(len) => {
                    let frame = Frame {
                        start: self.pos,
                        bytes: &self.buf[self.pos..self.pos + len],
                    };
                    self.pos += len;
                    return Some(frame);
                }
                None => {
                    self.pos += 1;
                    self.skipped += 1;
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Frames<'_> {}

/// Scan `buf` and collect every frame.
///
/// Fails with [`Error::FrameSyncNotFound`] when the scan yields nothing.
pub fn parse_frames(buf: &[u8]) -> Result<Vec<Frame<'_>>> {
    let frames: Vec<_> = Frames::new(buf).collect();
    if frames.is_empty() {
        return Err(Error::FrameSyncNotFound { scanned: buf.len() });
    }
    Ok(frames)
}
