//! # BSD Index Repository
//!
//! This crate provides the seams between the indexing pipeline and its
//! external collaborators: the search engine holding the physical indices
//! and the relational store holding the authoritative records. It includes
//! the error types, the trait definitions, an OpenSearch implementation,
//! a snapshot-backed record store, and the physical index naming grammar.

pub mod config;
pub mod descriptor;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod snapshot;
pub mod types;

pub use config::SearchIndexConfig;
pub use descriptor::{IndexDescriptor, PhysicalIndexName};
pub use errors::{NamingError, RecordStoreError, SearchIndexError};
pub use interfaces::{RecordStore, SearchIndexProvider};
pub use opensearch::OpenSearchClient;
pub use snapshot::SnapshotRecordStore;
pub use types::{AliasAction, BulkItemFailure, BulkOperationSummary};
