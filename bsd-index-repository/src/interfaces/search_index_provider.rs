//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{AliasAction, BulkOperationSummary};
use bsd_index_shared::{BsdDocument, DocumentType, RecordId};

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, etc.).
///
/// Every document operation takes the target index explicitly: during a
/// rebuild the pipeline writes to a physical index that the alias does not
/// point at yet.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create a physical index with the given `settings` and `mappings` body.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(SearchIndexError)` - If it already exists or creation fails
    async fn create_index(&self, name: &str, body: &Value) -> Result<(), SearchIndexError>;

    /// Update dynamic settings (`index.*`) of a physical index.
    async fn put_index_settings(&self, name: &str, settings: &Value)
        -> Result<(), SearchIndexError>;

    /// List the physical indices currently bound to `alias`.
    ///
    /// An alias that does not exist yields an empty list, not an error.
    async fn get_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError>;

    /// Apply every action in a single atomic alias update request.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError>;

    /// List physical index names matching a wildcard pattern.
    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchIndexError>;

    /// Delete a physical index.
    async fn delete_index(&self, name: &str) -> Result<(), SearchIndexError>;

    /// Write documents by id into `index`, replacing existing documents with the same id.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkOperationSummary)` - Contains aggregate statistics and rejected items
    /// * `Err(SearchIndexError)` - If the bulk request fails entirely
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BsdDocument],
    ) -> Result<BulkOperationSummary, SearchIndexError>;

    /// Delete documents by id from `index`. Missing documents count as deleted.
    async fn bulk_delete(
        &self,
        index: &str,
        ids: &[RecordId],
    ) -> Result<BulkOperationSummary, SearchIndexError>;

    /// Delete every document of `document_type` from `index`, or every document when `None`.
    ///
    /// Version conflicts with concurrent writes are tolerated.
    ///
    /// # Returns
    ///
    /// * `Ok(deleted)` - The number of deleted documents
    async fn delete_by_type(
        &self,
        index: &str,
        document_type: Option<DocumentType>,
    ) -> Result<u64, SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
