//! Request and response types for search index operations.

use serde_json::{json, Value};

use bsd_index_shared::RecordId;

/// One action of an atomic alias update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// The action in `_aliases` request format.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Add { index, alias } => json!({ "add": { "index": index, "alias": alias } }),
            Self::Remove { index, alias } => {
                json!({ "remove": { "index": index, "alias": alias } })
            }
        }
    }
}

/// A single document that a bulk request failed to write or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    pub id: RecordId,
    pub status: u16,
    pub reason: String,
}

/// Summary of a bulk operation.
///
/// The request as a whole succeeded; individual items may still have failed.
/// Callers decide whether item failures are fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOperationSummary {
    /// Total number of items in the request.
    pub total: usize,
    /// Number of items applied.
    pub succeeded: usize,
    /// Items rejected by the search engine.
    pub failures: Vec<BulkItemFailure>,
}

impl BulkOperationSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
