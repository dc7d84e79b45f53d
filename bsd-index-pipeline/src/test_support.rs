//! Fixtures shared by the pipeline tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bsd_index_repository::{
    AliasAction, BulkOperationSummary, SearchIndexError, SearchIndexProvider, SnapshotRecordStore,
};
use bsd_index_shared::{BsdDocument, BsdRecord, Cursor, DocumentType, RecordId};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

/// A record that projects cleanly, updated on day `d` of January 2024.
pub fn record(document_type: DocumentType, id: &str, cursor: i64, d: u32) -> BsdRecord {
    BsdRecord {
        id: RecordId::from(id),
        document_type,
        cursor: Cursor(cursor),
        created_at: day(1),
        updated_at: day(d),
        is_deleted: false,
        data: json!({
            "status": "SENT",
            "readableId": format!("BSD-{}", id),
            "wasteCode": "06 07 01*",
            "emitterCompanySiret": "13001045700013",
        }),
    }
}

/// A store holding `{TYPE}-1..={TYPE}-n` with cursors `1..=n`, updated on day 1.
pub fn seeded_store(document_type: DocumentType, n: i64) -> Arc<SnapshotRecordStore> {
    Arc::new(SnapshotRecordStore::from_records(records(document_type, 1..=n, 1)))
}

pub fn records(document_type: DocumentType, range: RangeInclusive<i64>, d: u32) -> Vec<BsdRecord> {
    range
        .map(|i| record(document_type, &format!("{}-{}", document_type, i), i, d))
        .collect()
}

pub fn ids(prefix: &str, range: RangeInclusive<i64>) -> Vec<RecordId> {
    range.map(|i| RecordId::new(format!("{}-{}", prefix, i))).collect()
}

#[derive(Default)]
struct MemoryIndex {
    settings: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, MemoryIndex>,
    aliases: HashMap<String, Vec<String>>,
    alias_updates: Vec<Vec<AliasAction>>,
    deleted: Vec<String>,
}

impl State {
    /// Resolve an index name or an alias bound to exactly one index.
    fn resolve(&mut self, name: &str) -> Result<&mut MemoryIndex, SearchIndexError> {
        let target = match self.aliases.get(name).map(Vec::as_slice) {
            Some([single]) => single.clone(),
            Some(bound) if !bound.is_empty() => {
                return Err(SearchIndexError::bulk_operation(format!(
                    "alias {} points to {} indices",
                    name,
                    bound.len()
                )))
            }
            _ => name.to_string(),
        };
        self.indices
            .get_mut(&target)
            .ok_or_else(|| SearchIndexError::index_not_found(target))
    }
}

/// A search engine double that keeps indices, documents and aliases in memory.
#[derive(Default)]
pub struct InMemorySearchIndex {
    state: Mutex<State>,
    fail_bulk: AtomicBool,
    fail_alias_update: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent bulk upsert fail.
    pub fn fail_bulk_upserts(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent alias update fail.
    pub fn fail_alias_updates(&self, fail: bool) {
        self.fail_alias_update.store(fail, Ordering::SeqCst);
    }

    /// Create an empty index bound to `alias`, as an earlier deployment would have.
    pub async fn seed_bound_index(&self, name: &str, alias: &str) {
        let mut state = self.state.lock().await;
        state.indices.insert(name.to_string(), MemoryIndex::default());
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .push(name.to_string());
    }

    pub async fn seed_index(&self, name: &str) {
        self.state
            .lock()
            .await
            .indices
            .insert(name.to_string(), MemoryIndex::default());
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }

    pub async fn bound(&self, alias: &str) -> Vec<String> {
        let mut bound = self
            .state
            .lock()
            .await
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default();
        bound.sort();
        bound
    }

    pub async fn alias_updates(&self) -> Vec<Vec<AliasAction>> {
        self.state.lock().await.alias_updates.clone()
    }

    pub async fn deleted_indices(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn settings(&self, index: &str) -> Value {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .map(|i| i.settings.clone())
            .unwrap_or(Value::Null)
    }

    pub async fn document_ids(&self, index: &str) -> Vec<RecordId> {
        self.documents(index)
            .await
            .into_keys()
            .map(RecordId::from)
            .collect()
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.documents(index).await.remove(id)
    }

    pub async fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        let mut state = self.state.lock().await;
        state
            .resolve(index)
            .map(|i| i.documents.clone())
            .unwrap_or_default()
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn create_index(&self, name: &str, body: &Value) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        if state.indices.contains_key(name) {
            return Err(SearchIndexError::index_creation(format!(
                "resource_already_exists_exception: {}",
                name
            )));
        }
        let settings = body
            .get("settings")
            .cloned()
            .unwrap_or_else(|| json!({}));
        state.indices.insert(
            name.to_string(),
            MemoryIndex {
                settings,
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_index_settings(
        &self,
        name: &str,
        settings: &Value,
    ) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        let index = state
            .indices
            .get_mut(name)
            .ok_or_else(|| SearchIndexError::index_not_found(name))?;
        merge(&mut index.settings, settings);
        Ok(())
    }

    async fn get_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        Ok(self.bound(alias).await)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        if self.fail_alias_update.load(Ordering::SeqCst) {
            return Err(SearchIndexError::alias("alias update rejected"));
        }

        let mut state = self.state.lock().await;
        let mut aliases = state.aliases.clone();
        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if !state.indices.contains_key(index) {
                        return Err(SearchIndexError::index_not_found(index.clone()));
                    }
                    let bound = aliases.entry(alias.clone()).or_default();
                    if !bound.contains(index) {
                        bound.push(index.clone());
                    }
                }
                AliasAction::Remove { index, alias } => {
                    let bound = aliases.entry(alias.clone()).or_default();
                    let before = bound.len();
                    bound.retain(|bound| bound != index);
                    if bound.len() == before {
                        return Err(SearchIndexError::alias(format!(
                            "aliases [{}] missing on [{}]",
                            alias, index
                        )));
                    }
                }
            }
        }
        state.aliases = aliases;
        state.alias_updates.push(actions.to_vec());
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchIndexError> {
        let state = self.state.lock().await;
        let matches = |name: &str| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == pattern,
        };
        Ok(state
            .indices
            .keys()
            .filter(|name| matches(name))
            .cloned()
            .collect())
    }

    async fn delete_index(&self, name: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        if state.indices.remove(name).is_none() {
            return Err(SearchIndexError::index_not_found(name));
        }
        for bound in state.aliases.values_mut() {
            bound.retain(|index| index != name);
        }
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BsdDocument],
    ) -> Result<BulkOperationSummary, SearchIndexError> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(SearchIndexError::bulk_operation("bulk request rejected"));
        }
        let mut state = self.state.lock().await;
        let target = state.resolve(index)?;
        for document in documents {
            let source = serde_json::to_value(document)
                .map_err(|e| SearchIndexError::parse(e.to_string()))?;
            target.documents.insert(document.id.to_string(), source);
        }
        Ok(BulkOperationSummary {
            total: documents.len(),
            succeeded: documents.len(),
            failures: Vec::new(),
        })
    }

    async fn bulk_delete(
        &self,
        index: &str,
        ids: &[RecordId],
    ) -> Result<BulkOperationSummary, SearchIndexError> {
        let mut state = self.state.lock().await;
        let target = state.resolve(index)?;
        for id in ids {
            target.documents.remove(id.as_str());
        }
        Ok(BulkOperationSummary {
            total: ids.len(),
            succeeded: ids.len(),
            failures: Vec::new(),
        })
    }

    async fn delete_by_type(
        &self,
        index: &str,
        document_type: Option<DocumentType>,
    ) -> Result<u64, SearchIndexError> {
        let mut state = self.state.lock().await;
        let target = state.resolve(index)?;
        let before = target.documents.len();
        target.documents.retain(|_, source| match document_type {
            Some(document_type) => source["type"] != document_type.as_str(),
            None => false,
        });
        Ok((before - target.documents.len()) as u64)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(true)
    }
}
