//! Interface definitions for the external collaborators of the indexer.
//!
//! `SearchIndexProvider` abstracts the search engine and `RecordStore`
//! abstracts the relational store, allowing dependency injection and
//! in-memory implementations in tests.

mod record_store;
mod search_index_provider;

pub use record_store::RecordStore;
pub use search_index_provider::SearchIndexProvider;
