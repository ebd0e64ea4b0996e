//! ADTS header decoding.

/// Size of an ADTS header without CRC.
pub const HEADER_SIZE: usize = 7;

/// Largest value the 13-bit frame length field can hold.
pub const MAX_FRAME_LEN: usize = 0x1FFF;

/// PCM samples carried by one raw data block.
pub const SAMPLES_PER_BLOCK: u32 = 1024;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Whether the two bytes at `pos` carry the 12-bit sync word.
#[inline]
pub fn is_sync(buf: &[u8], pos: usize) -> bool {
    pos + 1 < buf.len() && buf[pos] == 0xFF && buf[pos + 1] & 0xF0 == 0xF0
}

/// Declared length of a valid frame starting at `pos`.
///
/// Returns `None` unless there is a sync word at `pos`, the full header fits
/// in the buffer, and the declared length is larger than the header and ends
/// within the buffer.
#[inline]
pub fn frame_length_at(buf: &[u8], pos: usize) -> Option<usize> {
    if pos + HEADER_SIZE > buf.len() || !is_sync(buf, pos) {
        return None;
    }
    let len = declared_length(&buf[pos..pos + HEADER_SIZE]);
    (len > HEADER_SIZE && pos + len <= buf.len()).then_some(len)
}

fn declared_length(h: &[u8]) -> usize {
    ((h[3] as usize & 0x03) << 11) | ((h[4] as usize) << 3) | ((h[5] as usize) >> 5)
}

/// Decoded fields of an ADTS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameHeader {
    /// MPEG-4 audio object type minus one (1 = AAC LC).
    pub profile: u8,
    /// Index into the sampling frequency table.
    pub sampling_index: u8,
    /// Channel configuration (2 = stereo).
    pub channel_config: u8,
    /// Whole frame length including the header.
    pub frame_length: u16,
    /// Number of raw data blocks in the frame.
    pub raw_blocks: u8,
    /// True when no CRC follows the fixed header.
    pub protection_absent: bool,
}

impl FrameHeader {
    /// AAC LC, 44.1 kHz, stereo, one raw block, no CRC.
    pub fn aac_lc(frame_length: u16) -> Self {
        Self {
            profile: 1,
            sampling_index: 4,
            channel_config: 2,
            frame_length,
            raw_blocks: 1,
            protection_absent: true,
        }
    }

    /// Decode the header at the start of `bytes`.
    ///
    /// Only checks that there is a sync word and enough bytes; length
    /// validation is [`frame_length_at`]'s job.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE || !is_sync(bytes, 0) {
            return None;
        }
        Some(Self {
            profile: (bytes[2] >> 6) & 0x03,
            sampling_index: (bytes[2] >> 2) & 0x0F,
            channel_config: ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6),
            frame_length: declared_length(bytes) as u16,
            raw_blocks: (bytes[6] & 0x03) + 1,
            protection_absent: bytes[1] & 0x01 == 1,
        })
    }

    /// Encode to the seven fixed header bytes.
    ///
    /// Buffer fullness is written as 0x7FF (variable rate signalling); the
    /// length is truncated to 13 bits.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.frame_length as usize & MAX_FRAME_LEN;
        let fullness: usize = 0x7FF;
        [
            0xFF,
            0xF0 | u8::from(self.protection_absent),
            ((self.profile & 0x03) << 6)
                | ((self.sampling_index & 0x0F) << 2)
                | ((self.channel_config >> 2) & 0x01),
            ((self.channel_config & 0x03) << 6) | ((len >> 11) as u8 & 0x03),
            (len >> 3) as u8,
            (((len & 0x07) << 5) as u8) | ((fullness >> 6) as u8 & 0x1F),
            (((fullness & 0x3F) << 2) as u8) | (self.raw_blocks.saturating_sub(1) & 0x03),
        ]
    }

    /// Sampling rate in Hz, if the index is a defined one.
    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sampling_index as usize).copied()
    }

    /// PCM samples per channel decoded from this frame.
    pub fn samples(&self) -> u32 {
        self.raw_blocks as u32 * SAMPLES_PER_BLOCK
    }

    /// Playback duration of this frame in seconds.
    pub fn duration_secs(&self) -> Option<f64> {
        self.sample_rate()
            .map(|rate| self.samples() as f64 / rate as f64)
    }
}
