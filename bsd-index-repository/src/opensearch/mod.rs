//! OpenSearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch as the backend, and the BSD index mappings.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::{bsd_index_mappings, bsd_index_settings, BSD_MAPPING_VERSION};
