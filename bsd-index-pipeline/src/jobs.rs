//! Job payloads and their handlers.
//!
//! Payloads cross the queue as JSON, so both are plain serde types. The
//! per-chunk payload names its target cluster; a worker wired to another
//! cluster refuses it instead of writing to the wrong place.

use std::sync::Arc;

use async_trait::async_trait;
use bsd_index_repository::IndexDescriptor;
use bsd_index_shared::{DocumentType, RecordId};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::PipelineError;
use crate::indexer::BulkIndexer;
use crate::orchestrator::{DispatchMode, ReindexOrchestrator};
use crate::queue::JobHandler;

/// Index one chunk of ids into a physical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexChunkJob {
    pub document_type: DocumentType,
    pub index: String,
    pub ids: Vec<RecordId>,
    pub target_url: String,
}

/// Run a full rebuild of an index family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildJob {
    pub index: IndexDescriptor,
    pub force: bool,
}

pub struct ChunkJobHandler {
    indexer: Arc<BulkIndexer>,
    target_url: String,
}

impl ChunkJobHandler {
    pub fn new(indexer: Arc<BulkIndexer>, target_url: impl Into<String>) -> Self {
        Self {
            indexer,
            target_url: target_url.into(),
        }
    }
}

#[async_trait]
impl JobHandler<IndexChunkJob> for ChunkJobHandler {
    #[instrument(skip_all, fields(document_type = %job.document_type, index = %job.index, id_count = job.ids.len()))]
    async fn handle(&self, job: IndexChunkJob) -> Result<(), PipelineError> {
        if job.target_url != self.target_url {
            return Err(PipelineError::config(format!(
                "chunk job targets {}, this worker writes to {}",
                job.target_url, self.target_url
            )));
        }
        self.indexer
            .index(job.document_type, &job.ids, &job.index)
            .await?;
        Ok(())
    }
}

pub struct RebuildJobHandler {
    orchestrator: Arc<ReindexOrchestrator>,
}

impl RebuildJobHandler {
    pub fn new(orchestrator: Arc<ReindexOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler<RebuildJob> for RebuildJobHandler {
    #[instrument(skip_all, fields(alias = %job.index.alias, force = job.force))]
    async fn handle(&self, job: RebuildJob) -> Result<(), PipelineError> {
        // The descriptor arrived as a payload; it never went through the constructor.
        job.index.validate()?;
        let outcome = self
            .orchestrator
            .reindex_all(&job.index, job.force, DispatchMode::Queue)
            .await?;
        info!(outcome = ?outcome, "Rebuild job finished");
        Ok(())
    }
}
