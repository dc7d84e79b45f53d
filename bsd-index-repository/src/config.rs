//! Configuration types for the search index client.

/// Configuration for the search index client.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Maximum number of documents allowed in a single bulk request.
    /// Set to None to disable the limit (not recommended for production).
    pub max_batch_size: Option<usize>,
    /// Replica count applied once an index has been populated.
    pub number_of_replicas: u32,
    /// Refresh interval applied once an index has been populated.
    pub refresh_interval: String,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Some(1000),
            number_of_replicas: 1,
            refresh_interval: "1s".to_string(),
        }
    }
}

impl SearchIndexConfig {
    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
            ..Self::default()
        }
    }
}
