//! Trackwave-Common: Shared types and errors.
//!
//! This crate provides functionality used across the trackwave crates:
//!
//! - **Typed IDs**: wrappers for tracks, listeners and stream sessions
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use trackwave_common::{ListenerId, TrackId, Error, Result};
//!
//! let track = TrackId::from(42);
//! let listener: ListenerId = "night_owl".parse().unwrap();
//! assert_eq!(track.to_string(), "42");
//! assert_eq!(listener.as_str(), "night_owl");
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("track"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
