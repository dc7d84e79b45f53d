//! Snapshot-backed record store.
//!
//! Holds records in memory, ordered by cursor per document type. It can be
//! loaded from a newline-delimited JSON export (one [`BsdRecord`] per line)
//! and mutated in place to simulate live writes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::RecordStoreError;
use crate::interfaces::RecordStore;
use bsd_index_shared::{BsdRecord, Cursor, DocumentType, IdRow, RecordId};

#[derive(Default)]
struct Collection {
    by_cursor: BTreeMap<Cursor, BsdRecord>,
    cursors: HashMap<RecordId, Cursor>,
}

impl Collection {
    fn upsert(&mut self, record: BsdRecord) {
        if let Some(previous) = self.cursors.insert(record.id.clone(), record.cursor) {
            self.by_cursor.remove(&previous);
        }
        self.by_cursor.insert(record.cursor, record);
    }
}

/// A [`RecordStore`] over an in-memory snapshot of the relational store.
#[derive(Default)]
pub struct SnapshotRecordStore {
    collections: RwLock<HashMap<DocumentType, Collection>>,
}

impl SnapshotRecordStore {
    /// Build a store holding the given records.
    pub fn from_records(records: impl IntoIterator<Item = BsdRecord>) -> Self {
        let mut collections: HashMap<DocumentType, Collection> = HashMap::new();
        for record in records {
            collections
                .entry(record.document_type)
                .or_default()
                .upsert(record);
        }
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Load a newline-delimited JSON export. Blank lines are skipped.
    pub async fn from_ndjson_file(path: impl AsRef<Path>) -> Result<Self, RecordStoreError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RecordStoreError::read(format!("{}: {}", path.display(), e)))?;

        let records = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str::<BsdRecord>(line)
                    .map_err(|e| RecordStoreError::decode(number + 1, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(path = %path.display(), records = records.len(), "Loaded record snapshot");
        Ok(Self::from_records(records))
    }

    /// Insert a record, or replace the record with the same id.
    ///
    /// The cursor of a replaced record may change only upwards, as a row
    /// number would; callers simulating updates keep the original cursor.
    pub async fn upsert(&self, record: BsdRecord) {
        self.collections
            .write()
            .await
            .entry(record.document_type)
            .or_default()
            .upsert(record);
    }

    /// Flag a record as soft-deleted.
    pub async fn soft_delete(&self, document_type: DocumentType, id: &RecordId, at: DateTime<Utc>) {
        let mut collections = self.collections.write().await;
        if let Some(collection) = collections.get_mut(&document_type) {
            if let Some(cursor) = collection.cursors.get(id).copied() {
                if let Some(record) = collection.by_cursor.get_mut(&cursor) {
                    record.is_deleted = true;
                    record.updated_at = at;
                }
            }
        }
    }

    /// Number of non-deleted records of a type.
    pub async fn count(&self, document_type: DocumentType) -> usize {
        self.collections
            .read()
            .await
            .get(&document_type)
            .map(|c| c.by_cursor.values().filter(|r| !r.is_deleted).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for SnapshotRecordStore {
    async fn fetch_id_page(
        &self,
        document_type: DocumentType,
        after: Option<Cursor>,
        since: Option<DateTime<Utc>>,
        include_deleted: bool,
        limit: usize,
    ) -> Result<Vec<IdRow>, RecordStoreError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&document_type) else {
            return Ok(Vec::new());
        };

        let rows = match after {
            Some(after) => collection.by_cursor.range((
                std::ops::Bound::Excluded(after),
                std::ops::Bound::Unbounded,
            )),
            None => collection.by_cursor.range(..),
        };

        Ok(rows
            .map(|(_, record)| record)
            .filter(|record| include_deleted || !record.is_deleted)
            .filter(|record| since.map_or(true, |since| record.updated_at >= since))
            .take(limit)
            .map(|record| IdRow {
                id: record.id.clone(),
                cursor: record.cursor,
            })
            .collect())
    }

    async fn fetch_records(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
        _relations: &[&str],
    ) -> Result<Vec<BsdRecord>, RecordStoreError> {
        // Snapshot lines carry their relations inline in `data`.
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&document_type) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection.cursors.get(id))
            .filter_map(|cursor| collection.by_cursor.get(cursor))
            .filter(|record| !record.is_deleted)
            .cloned()
            .collect())
    }
}
