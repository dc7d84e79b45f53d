//! Error types for the BSD index repository.

mod naming_error;
mod record_store_error;
mod search_index_error;

pub use naming_error::NamingError;
pub use record_store_error::RecordStoreError;
pub use search_index_error::SearchIndexError;
