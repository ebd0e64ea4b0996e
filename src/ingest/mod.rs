//! Ingestion: probe an upload, record it, and produce the HLS segments and
//! the ADTS bitstream.

mod pipeline;
mod pool;

pub use pipeline::{IngestOutcome, IngestPipeline};
pub use pool::IngestPool;
