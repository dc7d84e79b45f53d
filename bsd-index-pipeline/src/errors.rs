//! Error types for the indexing pipeline.

use std::time::Duration;

use bsd_index_repository::{NamingError, RecordStoreError, SearchIndexError};
use bsd_index_shared::UnknownDocumentType;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the job queue.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The queue stopped before the job completed.
    #[error("Queue {0} is closed")]
    Closed(String),

    /// The job payload could not be serialized or deserialized.
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    /// Every attempt of the job failed.
    #[error("Job {job_id} failed after {attempts} attempt(s): {message}")]
    JobFailed {
        job_id: Uuid,
        attempts: u32,
        message: String,
    },

    /// Waiting for the job took longer than allowed.
    #[error("Job {job_id} did not finish within {timeout:?}")]
    Timeout { job_id: Uuid, timeout: Duration },
}

/// Errors that can occur in the indexing pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Deployment or code/configuration mismatch. Never retried.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The alias is not bound to exactly one physical index.
    #[error("Alias {alias} is bound to {count} physical indices, expected exactly one")]
    AliasNotBound { alias: String, count: usize },

    /// Error from the search engine.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    /// Error from the relational store.
    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordStoreError),

    /// Error from the job queue.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A record could not be projected into a search document.
    #[error("Projection error: {0}")]
    ProjectionError(String),

    /// Documents were rejected while loading a chunk.
    #[error("Loader error: {0}")]
    LoaderError(String),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a projection error.
    pub fn projection(msg: impl Into<String>) -> Self {
        Self::ProjectionError(msg.into())
    }

    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }

    /// Whether retrying can never succeed.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Queue(QueueError::InvalidPayload(_))
        )
    }
}

impl From<NamingError> for PipelineError {
    fn from(err: NamingError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<UnknownDocumentType> for PipelineError {
    fn from(err: UnknownDocumentType) -> Self {
        Self::ConfigError(err.to_string())
    }
}
