//! # BSD Indexer
//!
//! Operator entry point for the BSD search index.
//!
//! This crate reads the process configuration, wires the pipeline
//! components together and exposes the command line used to rebuild,
//! reindex and inspect the index family.

pub mod cli;
pub mod config;
pub mod logging;

pub use cli::{Cli, Command};
pub use config::{Dependencies, IndexerConfig};

use bsd_index_repository::{NamingError, RecordStoreError, SearchIndexError};
use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] bsd_index_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// Record store error.
    #[error("Record store error: {0}")]
    StoreError(#[from] RecordStoreError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<NamingError> for IndexingError {
    fn from(err: NamingError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
