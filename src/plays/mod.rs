//! Play counting.
//!
//! [`PlayDebouncer`] decides when listening activity amounts to a play;
//! [`PlayCounter`] persists confirmed plays and tells the listener's open
//! streams about them.

mod counter;
mod debouncer;

pub use counter::{DeliveryMode, PlayCounter, PlaySink, PLAY_CONFIRMED};
pub use debouncer::{
    start_sweep_task, ConfirmedPlay, DebounceSettings, EntrySnapshot, PlayDebouncer, PlayKey,
};
