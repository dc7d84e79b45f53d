//! Record store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::RecordStoreError;
use bsd_index_shared::{BsdRecord, Cursor, DocumentType, IdRow, RecordId};

/// Read-only access to the authoritative records of the relational store.
///
/// Soft-deleted records are never returned by [`RecordStore::fetch_records`],
/// and only returned by [`RecordStore::fetch_id_page`] when asked for.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the next page of identifiers of one document type.
    ///
    /// Rows are ordered by cursor ascending and start strictly after `after`
    /// (from the beginning when `None`). When `since` is set, only records
    /// updated at or after that instant are returned. `include_deleted` adds
    /// soft-deleted rows, so a change feed also carries deletions.
    ///
    /// # Returns
    ///
    /// * `Ok(rows)` - At most `limit` rows; an empty page means the end was reached
    /// * `Err(RecordStoreError)` - If the store cannot be read
    async fn fetch_id_page(
        &self,
        document_type: DocumentType,
        after: Option<Cursor>,
        since: Option<DateTime<Utc>>,
        include_deleted: bool,
        limit: usize,
    ) -> Result<Vec<IdRow>, RecordStoreError>;

    /// Load the full records for exactly the given ids, eager-loading `relations`.
    ///
    /// Ids that do not exist or are soft-deleted are absent from the result.
    async fn fetch_records(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
        relations: &[&str],
    ) -> Result<Vec<BsdRecord>, RecordStoreError>;
}
