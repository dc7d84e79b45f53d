//! The closed set of record kinds the indexer knows about.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A kind of waste-shipment record ("BSD") indexed into the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    /// Hazardous waste tracking form.
    Bsdd,
    /// Asbestos waste.
    Bsda,
    /// Infectious medical waste.
    Bsdasri,
    /// Fluorinated gases.
    Bsff,
    /// End-of-life vehicles.
    Bsvhu,
    /// Human anatomical parts.
    Bspaoh,
}

impl DocumentType {
    /// Every document type, in the order full reindexes walk them.
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Bsdd,
        DocumentType::Bsda,
        DocumentType::Bsdasri,
        DocumentType::Bsff,
        DocumentType::Bsvhu,
        DocumentType::Bspaoh,
    ];

    /// The canonical upper-case name, as stored in the `type` field of documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Bsdd => "BSDD",
            DocumentType::Bsda => "BSDA",
            DocumentType::Bsdasri => "BSDASRI",
            DocumentType::Bsff => "BSFF",
            DocumentType::Bsvhu => "BSVHU",
            DocumentType::Bspaoh => "BSPAOH",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known document type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown document type: {0}")]
pub struct UnknownDocumentType(pub String);

impl FromStr for DocumentType {
    type Err = UnknownDocumentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDocumentType(s.to_string()))
    }
}
