//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the BSD search index.

use serde_json::{json, Value};

/// Version of the mapping below. Bump it whenever the mapping or the shape of
/// projected documents changes: the next `reindex-all` run then rebuilds the
/// index family instead of reporting it current.
pub const BSD_MAPPING_VERSION: &str = "1.1.0";

/// Static settings applied when a physical index is created.
///
/// Replicas and refresh interval are overridden while an index is being
/// populated and restored afterwards.
pub fn bsd_index_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1,
        "analysis": {
            "normalizer": {
                "lowercase": {
                    "type": "custom",
                    "filter": ["lowercase", "asciifolding"]
                }
            }
        }
    })
}

/// Mappings of the BSD search documents.
///
/// - **Keyword fields**: for filtering by type, status and company
/// - **readableId**: normalized keyword for case-insensitive exact lookups
/// - **Date fields**: for sorting and catch-up verification
pub fn bsd_index_mappings() -> Value {
    json!({
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "type": { "type": "keyword" },
            "readableId": {
                "type": "keyword",
                "normalizer": "lowercase"
            },
            "status": { "type": "keyword" },
            "isDraft": { "type": "boolean" },
            "wasteCode": { "type": "keyword" },
            "sirets": { "type": "keyword" },
            "createdAt": { "type": "date" },
            "updatedAt": { "type": "date" }
        }
    })
}
