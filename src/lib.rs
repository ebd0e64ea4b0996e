//! Trackwave - audio track ingestion and delivery
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod error;
pub mod ingest;
pub mod plays;
pub mod server;
pub mod storage;
pub mod streaming;

pub use error::{Error, Result};
