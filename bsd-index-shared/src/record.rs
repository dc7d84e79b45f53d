//! Relational-side types: record identifiers, pagination cursors and records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DocumentType;

/// Identifier of an authoritative record, also used as the search document `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Strictly monotonic pagination key of one document type's identifier space.
///
/// Backed by an auto-incremented row number: values are never reused, so a
/// page issued for `after = c` is stable as long as no row below `c` is
/// physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub i64);

/// One row of an identifier page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRow {
    pub id: RecordId,
    pub cursor: Cursor,
}

/// An authoritative record loaded from the relational store, relations included.
///
/// `data` holds the record columns and eager-loaded relations as JSON; the
/// projection functions read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BsdRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub cursor: Cursor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub data: Value,
}

impl BsdRecord {
    /// Read a string column or relation field from `data`.
    ///
    /// `path` is dot separated, e.g. `"emitter.company.siret"`.
    pub fn str_field(&self, path: &str) -> Option<&str> {
        path.split('.')
            .try_fold(&self.data, |value, key| value.get(key))
            .and_then(Value::as_str)
    }

    /// Read a boolean column from `data`, defaulting to `false`.
    pub fn bool_field(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}
