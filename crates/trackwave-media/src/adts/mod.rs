//! ADTS framed bitstream handling.
//!
//! ADTS (Audio Data Transport Stream) wraps each AAC access unit in a
//! self-describing header:
//!
//! ```text
//! byte 0      byte 1      byte 2      byte 3      byte 4      byte 5      byte 6
//! SSSSSSSS    SSSSIL LP   PPFFFFpC    CCochXLL    LLLLLLLL    LLLBBBBB    BBBBBBRR
//! ```
//!
//! `S` sync (12 ones), `P` profile, `F` sampling-frequency index, `C` channel
//! configuration, `L` the 13-bit frame length counting the whole frame
//! including the header, `R` number of raw data blocks minus one.

mod batch;
mod header;
mod parser;
mod seek;
mod stats;

pub use batch::{Batch, FrameBatches};
pub use header::{
    frame_length_at, is_sync, FrameHeader, HEADER_SIZE, MAX_FRAME_LEN, SAMPLES_PER_BLOCK,
};
pub use parser::{parse_frames, Frame, Frames};
pub use seek::{estimate_duration, seek, SeekPoint};
pub use stats::{check_constant_bitrate, BitrateCheck, FrameStats};
