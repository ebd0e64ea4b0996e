//! Grouping frames into transport messages.

use bytes::{Bytes, BytesMut};

use super::parser::Frames;

/// Iterator of frame batches, each the concatenation of up to `size` frames.
///
/// Bytes skipped during resynchronization are left out, so every batch is a
/// clean run of whole frames.
#[derive(Debug, Clone)]
pub struct FrameBatches<'a> {
    frames: Frames<'a>,
    size: usize,
}

impl<'a> FrameBatches<'a> {
    /// A `size` of zero is treated as one frame per batch.
    pub fn new(buf: &'a [u8], size: usize) -> Self {
        Self {
            frames: Frames::new(buf),
            size: size.max(1),
        }
    }
}

/// One batch ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub frame_count: usize,
    pub data: Bytes,
}

impl Iterator for FrameBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let mut data = BytesMut::new();
        let mut frame_count = 0;
        for frame in self.frames.by_ref().take(self.size) {
            data.extend_from_slice(frame.bytes);
            frame_count += 1;
        }
        (frame_count > 0).then(|| Batch {
            frame_count,
            data: data.freeze(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adts::parser::tests::stream;

    #[test]
    fn test_batches_of_fixed_size() {
        let buf = stream(&[50; 450]);
        let batches: Vec<_> = FrameBatches::new(&buf, 200).collect();
        let counts: Vec<_> = batches.iter().map(|b| b.frame_count).collect();
        assert_eq!(counts, [200, 200, 50]);
        assert_eq!(batches[0].data.len(), 200 * 50);

        let joined: Vec<u8> = batches.iter().flat_map(|b| b.data.iter().copied()).collect();
        assert_eq!(joined, buf);
    }

    #[test]
    fn test_garbage_left_out() {
        let mut buf = vec![0x00, 0x11];
        buf.extend(stream(&[40, 40]));
        let batches: Vec<_> = FrameBatches::new(&buf, 10).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].data.len(), 80);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(FrameBatches::new(&[], 200).count(), 0);
    }
}
