//! Bounded concurrency for ingestion.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use trackwave_db::models::NewTrack;

use super::pipeline::{IngestOutcome, IngestPipeline};
use crate::error::{Error, Result};

/// Runs ingestions with at most `max_concurrent` encoder jobs at a time.
///
/// Each job runs on its own task, so a caller that goes away (a dropped HTTP
/// request) does not interrupt a job between writing the record and rolling
/// it back.
#[derive(Clone)]
pub struct IngestPool {
    pipeline: Arc<IngestPipeline>,
    permits: Arc<Semaphore>,
}

impl IngestPool {
    pub fn new(pipeline: Arc<IngestPipeline>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    /// Free job slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue an ingestion and wait for its result.
    pub async fn submit(&self, new: NewTrack, data: Bytes) -> Result<IngestOutcome> {
        if self.available() == 0 {
            tracing::debug!(title = %new.title, "All ingest slots busy, queueing upload");
        }
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| Error::internal("ingest pool closed"))?;
            pipeline.ingest(new, &data).await
        })
        .await
        .map_err(|e| Error::internal(format!("ingest task failed: {e}")))?
    }

    /// Stop accepting jobs; queued submissions fail.
    pub fn close(&self) {
        self.permits.close();
    }
}
