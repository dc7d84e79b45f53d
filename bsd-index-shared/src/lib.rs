//! # BSD Index Shared
//!
//! Data types shared by the repository, pipeline and binary crates of the
//! BSD search indexer: document types, record identifiers, pagination
//! cursors, relational records and their search-document projection.

mod document;
mod document_type;
mod record;

pub use document::BsdDocument;
pub use document_type::{DocumentType, UnknownDocumentType};
pub use record::{BsdRecord, Cursor, IdRow, RecordId};
