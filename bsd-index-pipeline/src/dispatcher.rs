//! Chunk dispatcher.
//!
//! Splits an id list into consecutive chunks and either hands each chunk to
//! an inline handler, one at a time, or submits one job per chunk to a
//! [`JobQueue`].

use std::future::Future;

use bsd_index_shared::RecordId;
use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::errors::PipelineError;
use crate::queue::{JobOptions, JobQueue, JobTicket};

/// Default number of ids per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default number of jobs submitted together.
pub const DEFAULT_ENQUEUE_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDispatcher {
    chunk_size: usize,
    enqueue_batch_size: usize,
}

impl Default for ChunkDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_ENQUEUE_BATCH_SIZE)
    }
}

impl ChunkDispatcher {
    pub fn new(chunk_size: usize, enqueue_batch_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            enqueue_batch_size: enqueue_batch_size.max(1),
        }
    }

    /// Call `handler` once per chunk, awaiting each call before the next.
    ///
    /// Stops at the first failing chunk.
    ///
    /// # Returns
    ///
    /// The number of chunks handled.
    pub async fn dispatch<F, Fut>(&self, ids: &[RecordId], mut handler: F) -> Result<usize, PipelineError>
    where
        F: FnMut(Vec<RecordId>) -> Fut,
        Fut: Future<Output = Result<(), PipelineError>>,
    {
        let mut handled = 0;
        for chunk in ids.chunks(self.chunk_size) {
            handler(chunk.to_vec()).await?;
            handled += 1;
        }
        debug!(chunks = handled, ids = ids.len(), "Dispatched chunks inline");
        Ok(handled)
    }

    /// Submit one job per chunk, `enqueue_batch_size` submissions at a time.
    ///
    /// Batches are submitted in order; the submissions of one batch are
    /// issued together. A rejected submission aborts the dispatch. Jobs
    /// already accepted keep running.
    #[instrument(skip_all, fields(queue = %queue.name(), id_count = ids.len()))]
    pub async fn dispatch_via_queue<J, F>(
        &self,
        ids: &[RecordId],
        queue: &dyn JobQueue<J>,
        options: &JobOptions,
        make_job: F,
    ) -> Result<Vec<JobTicket>, PipelineError>
    where
        F: Fn(Vec<RecordId>) -> J,
    {
        let chunks: Vec<&[RecordId]> = ids.chunks(self.chunk_size).collect();
        let mut tickets = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.enqueue_batch_size) {
            let submissions = batch
                .iter()
                .map(|chunk| queue.enqueue(make_job(chunk.to_vec()), options.clone()));
            tickets.extend(try_join_all(submissions).await?);
        }

        info!(jobs = tickets.len(), "Enqueued chunk jobs");
        Ok(tickets)
    }

    /// Wait until every job behind `tickets` has completed.
    ///
    /// Returns the first failure; the remaining jobs are not cancelled.
    pub async fn wait_for_completion(tickets: Vec<JobTicket>) -> Result<(), PipelineError> {
        let count = tickets.len();
        try_join_all(tickets.into_iter().map(JobTicket::finished)).await?;
        debug!(jobs = count, "All chunk jobs completed");
        Ok(())
    }
}
