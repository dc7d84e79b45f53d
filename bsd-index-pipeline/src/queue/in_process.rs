//! In-process job queue backed by a tokio channel and a fixed worker pool.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{JobHandler, JobOptions, JobQueue, JobTicket, QueueCounters, QueueName, QueueStats};
use crate::errors::{PipelineError, QueueError};

struct QueuedJob {
    id: Uuid,
    payload: String,
    options: JobOptions,
    done: oneshot::Sender<Result<(), QueueError>>,
}

/// A queue whose workers run inside the current process.
///
/// Jobs travel as their serialized JSON payload, exactly as they would
/// through an external transport. `concurrency` workers pull jobs; each
/// attempt is bounded by the job timeout and failed attempts are retried
/// with exponential backoff, except configuration errors.
///
/// Dropping the queue closes the channel; workers exit once it drains.
pub struct InProcessQueue<J> {
    name: QueueName,
    sender: mpsc::UnboundedSender<QueuedJob>,
    counters: Arc<QueueCounters>,
    _job: PhantomData<fn(J)>,
}

impl<J> InProcessQueue<J>
where
    J: Serialize + DeserializeOwned + Send + 'static,
{
    /// Create the queue and spawn its workers. Must be called within a tokio runtime.
    pub fn start(name: QueueName, concurrency: usize, handler: Arc<dyn JobHandler<J>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(QueueCounters::default());
        let concurrency = concurrency.max(1);

        for worker in 0..concurrency {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            let counters = Arc::clone(&counters);

            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(job) = next else {
                        debug!(queue = %name, worker, "Queue closed, worker exiting");
                        break;
                    };

                    counters.started();
                    let result = run_job::<J>(name, &job, handler.as_ref()).await;
                    counters.finished(result.is_ok());
                    // The submitter may have stopped waiting.
                    let _ = job.done.send(result);
                }
            });
        }

        info!(queue = %name, concurrency, "Started in-process queue");

        Self {
            name,
            sender,
            counters,
            _job: PhantomData,
        }
    }
}

async fn run_job<J>(
    queue: QueueName,
    job: &QueuedJob,
    handler: &dyn JobHandler<J>,
) -> Result<(), QueueError>
where
    J: DeserializeOwned,
{
    let max_attempts = job.options.max_attempts.max(1);
    let mut delay = job.options.initial_backoff;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let payload: J = serde_json::from_str(&job.payload)
            .map_err(|e| QueueError::InvalidPayload(e.to_string()))?;

        match tokio::time::timeout(job.options.timeout, handler.handle(payload)).await {
            Ok(Ok(())) => {
                debug!(queue = %queue, job_id = %job.id, attempt, "Job completed");
                return Ok(());
            }
            Ok(Err(e)) if e.is_config() => {
                error!(queue = %queue, job_id = %job.id, error = %e, "Job failed permanently");
                return Err(QueueError::JobFailed {
                    job_id: job.id,
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = timeout_message(job.options.timeout),
        }

        if attempt < max_attempts {
            warn!(
                queue = %queue,
                job_id = %job.id,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Job attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(job.options.max_backoff);
        }
    }

    error!(queue = %queue, job_id = %job.id, error = %last_error, "Job failed after retries");
    Err(QueueError::JobFailed {
        job_id: job.id,
        attempts: max_attempts,
        message: last_error,
    })
}

fn timeout_message(timeout: Duration) -> String {
    format!("attempt timed out after {:?}", timeout)
}

#[async_trait]
impl<J> JobQueue<J> for InProcessQueue<J>
where
    J: Serialize + DeserializeOwned + Send + 'static,
{
    fn name(&self) -> QueueName {
        self.name
    }

    async fn enqueue(&self, job: J, options: JobOptions) -> Result<JobTicket, QueueError> {
        let payload =
            serde_json::to_string(&job).map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
        let id = Uuid::new_v4();
        let (done, receiver) = oneshot::channel();

        self.counters.enqueued();
        self.sender
            .send(QueuedJob {
                id,
                payload,
                options,
                done,
            })
            .map_err(|_| {
                self.counters.started();
                self.counters.finished(false);
                QueueError::Closed(self.name.to_string())
            })?;

        Ok(JobTicket::new(id, self.name, receiver))
    }

    fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }
}
