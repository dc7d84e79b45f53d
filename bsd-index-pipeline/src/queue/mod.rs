//! Job queue abstraction.
//!
//! The pipeline only decides what is enqueued, with which payload and
//! options. Transport, persistence and retries belong to the queue
//! implementation; [`InProcessQueue`] is the one shipped with the indexer.

mod in_process;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{PipelineError, QueueError};

pub use in_process::InProcessQueue;

/// The queues known to the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    /// Per-chunk indexing jobs.
    BulkIndex,
    /// Top-level full rebuild jobs.
    BulkIndexMaster,
}

impl QueueName {
    pub const ALL: [QueueName; 2] = [QueueName::BulkIndex, QueueName::BulkIndexMaster];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::BulkIndex => "bulk-index",
            QueueName::BulkIndexMaster => "bulk-index-master",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job execution options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Maximum duration of one attempt.
    pub timeout: Duration,
    /// Attempts before the job is reported failed.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry.
    pub initial_backoff: Duration,
    /// Upper bound of the retry delay.
    pub max_backoff: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl JobOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Handle on an accepted job.
#[derive(Debug)]
pub struct JobTicket {
    pub id: Uuid,
    queue: QueueName,
    done: oneshot::Receiver<Result<(), QueueError>>,
}

impl JobTicket {
    pub fn new(id: Uuid, queue: QueueName, done: oneshot::Receiver<Result<(), QueueError>>) -> Self {
        Self { id, queue, done }
    }

    /// Wait until the job succeeded or exhausted its attempts.
    pub async fn finished(self) -> Result<(), QueueError> {
        self.done
            .await
            .map_err(|_| QueueError::Closed(self.queue.to_string()))?
    }

    /// Like [`JobTicket::finished`], giving up after `timeout`.
    pub async fn finished_within(self, timeout: Duration) -> Result<(), QueueError> {
        let job_id = self.id;
        tokio::time::timeout(timeout, self.finished())
            .await
            .map_err(|_| QueueError::Timeout { job_id, timeout })?
    }
}

/// Executes jobs pulled from a queue.
#[async_trait]
pub trait JobHandler<J>: Send + Sync {
    async fn handle(&self, job: J) -> Result<(), PipelineError>;
}

/// Submission side of a job queue.
#[async_trait]
pub trait JobQueue<J>: Send + Sync {
    fn name(&self) -> QueueName;

    /// Submit one job.
    ///
    /// # Returns
    ///
    /// * `Ok(JobTicket)` - The job was accepted; the ticket resolves when it completes
    /// * `Err(QueueError)` - The job was not accepted
    async fn enqueue(&self, job: J, options: JobOptions) -> Result<JobTicket, QueueError>;

    fn stats(&self) -> QueueStats;
}

/// Snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct QueueCounters {
    waiting: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl QueueCounters {
    pub(crate) fn enqueued(&self) {
        self.waiting.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn started(&self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finished(&self, success: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        QueueStats {
            waiting: self.waiting.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}
