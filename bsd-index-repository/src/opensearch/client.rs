//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cat::CatIndicesParts,
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesGetAliasParts, IndicesPutSettingsParts,
    },
    params::Conflicts,
    BulkParts, DeleteByQueryParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{AliasAction, BulkItemFailure, BulkOperationSummary};
use bsd_index_shared::{BsdDocument, DocumentType, RecordId};

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new("http://localhost:9200", SearchIndexConfig::default()).await?;
/// let summary = client.bulk_upsert("bsds_1.1.0_dev_2024-03-01t08--15--00.000z", &documents).await?;
/// println!("indexed {} documents", summary.succeeded);
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    config: SearchIndexConfig,
    url: String,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `config` - Bulk limits and the settings restored after population
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, config: SearchIndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch client");

        Ok(Self {
            client,
            config,
            url: url.to_string(),
        })
    }

    /// The cluster URL this client writes to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Turn a non-2xx response into an error built by `make_error`.
    async fn ensure_success(
        response: Response,
        operation: &str,
        make_error: fn(String) -> SearchIndexError,
    ) -> Result<Response, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation, "Request failed");
        Err(make_error(format!(
            "{} failed with status {}: {}",
            operation, status, error_body
        )))
    }

    async fn send_bulk(
        &self,
        index: &str,
        body: Vec<JsonBody<Value>>,
        action: &str,
    ) -> Result<BulkOperationSummary, SearchIndexError> {
        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_operation(e.to_string()))?;

        let response =
            Self::ensure_success(response, "Bulk", SearchIndexError::BulkOperationError).await?;
        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(parse_bulk_response(&response_body, action))
    }
}

/// Summarize a `_bulk` response body.
///
/// A `delete` item answered with 404 is counted as applied: the document is gone either way.
fn parse_bulk_response(body: &Value, action: &str) -> BulkOperationSummary {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut summary = BulkOperationSummary {
        total: items.len(),
        ..BulkOperationSummary::empty()
    };

    for item in items {
        let Some(result) = item.get(action) else {
            continue;
        };
        let status = result.get("status").and_then(Value::as_u64).unwrap_or(0) as u16;
        let missing_delete = action == "delete" && status == 404;

        match result.get("error") {
            Some(error) if !missing_delete => {
                let id = result.get("_id").and_then(Value::as_str).unwrap_or_default();
                let reason = error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                summary.failures.push(BulkItemFailure {
                    id: RecordId::from(id),
                    status,
                    reason,
                });
            }
            _ => summary.succeeded += 1,
        }
    }

    summary
}

/// Build the query selecting the documents of one type, or every document.
fn delete_by_type_query(document_type: Option<DocumentType>) -> Value {
    match document_type {
        Some(document_type) => json!({
            "query": { "term": { "type": document_type.as_str() } }
        }),
        None => json!({ "query": { "match_all": {} } }),
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    #[instrument(skip(self, body))]
    async fn create_index(&self, name: &str, body: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        Self::ensure_success(response, "Create index", SearchIndexError::IndexCreationError)
            .await?;

        info!(index = %name, "Created physical index");
        Ok(())
    }

    async fn put_index_settings(
        &self,
        name: &str,
        settings: &Value,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[name]))
            .body(json!({ "index": settings }))
            .send()
            .await
            .map_err(|e| SearchIndexError::settings(e.to_string()))?;

        Self::ensure_success(response, "Put settings", SearchIndexError::SettingsError).await?;

        debug!(index = %name, settings = %settings, "Index settings updated");
        Ok(())
    }

    async fn get_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        // 404 means the alias is not bound to anything yet
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let response =
            Self::ensure_success(response, "Get alias", SearchIndexError::AliasError).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let mut bindings: Vec<String> = body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default();
        bindings.sort();
        Ok(bindings)
    }

    #[instrument(skip(self, actions), fields(action_count = actions.len()))]
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        let actions: Vec<Value> = actions.iter().map(AliasAction::to_json).collect();

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        Self::ensure_success(response, "Update aliases", SearchIndexError::AliasError).await?;
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchIndexError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::Index(&[pattern]))
            .format("json")
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let response =
            Self::ensure_success(response, "List indices", SearchIndexError::Unknown).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let mut names: Vec<String> = body
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("index").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn delete_index(&self, name: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        Self::ensure_success(response, "Delete index", SearchIndexError::DeleteError).await?;

        info!(index = %name, "Deleted physical index");
        Ok(())
    }

    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BsdDocument],
    ) -> Result<BulkOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkOperationSummary::empty());
        }
        self.validate_batch_size(documents.len())?;

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            let source = serde_json::to_value(document)
                .map_err(|e| SearchIndexError::parse(e.to_string()))?;
            body.push(json!({ "index": { "_index": index, "_id": document.id } }).into());
            body.push(source.into());
        }

        let summary = self.send_bulk(index, body, "index").await?;
        debug!(
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "Bulk upsert completed"
        );
        Ok(summary)
    }

    async fn bulk_delete(
        &self,
        index: &str,
        ids: &[RecordId],
    ) -> Result<BulkOperationSummary, SearchIndexError> {
        if ids.is_empty() {
            return Ok(BulkOperationSummary::empty());
        }
        self.validate_batch_size(ids.len())?;

        let body: Vec<JsonBody<Value>> = ids
            .iter()
            .map(|id| json!({ "delete": { "_index": index, "_id": id } }).into())
            .collect();

        self.send_bulk(index, body, "delete").await
    }

    #[instrument(skip(self))]
    async fn delete_by_type(
        &self,
        index: &str,
        document_type: Option<DocumentType>,
    ) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .conflicts(Conflicts::Proceed)
            .refresh(true)
            .body(delete_by_type_query(document_type))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete_by_query(e.to_string()))?;

        // 409: documents rewritten by live writes while deleting, which is expected
        if response.status_code().as_u16() == 409 {
            info!(index = %index, "Delete by query hit version conflicts, ignoring");
            return Ok(0);
        }

        let response = Self::ensure_success(
            response,
            "Delete by query",
            SearchIndexError::DeleteByQueryError,
        )
        .await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        info!(index = %index, deleted, "Deleted documents by type");
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}
