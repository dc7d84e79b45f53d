//! Bulk projection and upsert.
//!
//! Loads the records of a chunk of ids, projects them into search documents
//! and writes them into an explicitly named target index. The target is the
//! new physical index during a rebuild and the alias for live indexing.

use std::collections::HashSet;
use std::sync::Arc;

use bsd_index_repository::{BulkOperationSummary, RecordStore, SearchIndexProvider};
use bsd_index_shared::{BsdDocument, DocumentType, RecordId};
use tracing::{info, instrument};

use crate::errors::PipelineError;
use crate::projection;

/// Counts for one indexed chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Documents written.
    pub indexed: usize,
    /// Ids whose record is gone from the store, removed from the target.
    pub removed: usize,
}

/// Projects records into documents and upserts them by id.
///
/// Writing the same ids twice leaves the target in the same state as
/// writing them once.
pub struct BulkIndexer {
    store: Arc<dyn RecordStore>,
    search: Arc<dyn SearchIndexProvider>,
}

impl BulkIndexer {
    pub fn new(store: Arc<dyn RecordStore>, search: Arc<dyn SearchIndexProvider>) -> Self {
        Self { store, search }
    }

    /// Index exactly `ids` of `document_type` into `target_index`.
    ///
    /// Ids the store no longer returns (soft-deleted since they were
    /// enumerated) are deleted from the target.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn index(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
        target_index: &str,
    ) -> Result<IndexSummary, PipelineError> {
        if ids.is_empty() {
            return Ok(IndexSummary::default());
        }

        let entry = projection::document_spec(document_type);
        let records = self
            .store
            .fetch_records(document_type, ids, entry.relations)
            .await?;

        let documents = records
            .iter()
            .map(entry.project)
            .collect::<Result<Vec<BsdDocument>, _>>()?;

        let written = self.search.bulk_upsert(target_index, &documents).await?;
        ensure_no_failures(&written, "index")?;

        let loaded: HashSet<&RecordId> = records.iter().map(|r| &r.id).collect();
        let missing: Vec<RecordId> = ids
            .iter()
            .filter(|id| !loaded.contains(id))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let removed = self.search.bulk_delete(target_index, &missing).await?;
            ensure_no_failures(&removed, "delete")?;
        }

        let summary = IndexSummary {
            indexed: written.succeeded,
            removed: missing.len(),
        };
        info!(
            indexed = summary.indexed,
            removed = summary.removed,
            "Indexed chunk"
        );
        Ok(summary)
    }

    /// Delete every document of `document_type` (or of every type) from `target_index`.
    pub async fn delete_all(
        &self,
        target_index: &str,
        document_type: Option<DocumentType>,
    ) -> Result<u64, PipelineError> {
        Ok(self.search.delete_by_type(target_index, document_type).await?)
    }
}

fn ensure_no_failures(summary: &BulkOperationSummary, action: &str) -> Result<(), PipelineError> {
    match summary.failures.first() {
        None => Ok(()),
        Some(first) => Err(PipelineError::loader(format!(
            "{} of {} documents rejected on {} (first: {} status {}: {})",
            summary.failures.len(),
            summary.total,
            action,
            first.id,
            first.status,
            first.reason
        ))),
    }
}
