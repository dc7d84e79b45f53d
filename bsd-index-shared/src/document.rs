//! The search-document projection of a BSD record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DocumentType, RecordId};

/// A document stored in the BSD search index.
///
/// The document `_id` is the record id, so re-indexing a record replaces its
/// previous document instead of adding a second one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BsdDocument {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub readable_id: String,
    pub status: String,
    pub is_draft: bool,
    pub waste_code: Option<String>,
    /// Every company identifier (SIRET) involved with the record, deduplicated.
    pub sirets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
