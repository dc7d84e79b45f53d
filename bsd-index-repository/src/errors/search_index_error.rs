//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to create a physical index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to read or write index settings.
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// Failed to read or update alias bindings.
    #[error("Alias error: {0}")]
    AliasError(String),

    /// Bulk request was rejected as a whole.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Failed to delete a physical index.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Delete-by-query request failed.
    #[error("Delete by query error: {0}")]
    DeleteByQueryError(String),

    /// Failed to serialize a document or parse a response.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Index not found.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a settings error.
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::SettingsError(msg.into())
    }

    /// Create an alias error.
    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a delete-by-query error.
    pub fn delete_by_query(msg: impl Into<String>) -> Self {
        Self::DeleteByQueryError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an index not found error.
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Self::IndexNotFound(name.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }
}
