use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bsd_index_repository::{
    RecordStore, RecordStoreError, SearchIndexConfig, SearchIndexProvider, SnapshotRecordStore,
};
use bsd_index_shared::{BsdDocument, BsdRecord, Cursor, DocumentType, IdRow, RecordId};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use super::*;
use crate::jobs::{ChunkJobHandler, RebuildJob, RebuildJobHandler};
use crate::queue::{InProcessQueue, QueueName};
use crate::test_support::{day, ids, record, records, InMemorySearchIndex};

const V1_OLDEST: &str = "bsds_v1_test_2023-01-01t00--00--00.000z";
const V1_OLDER: &str = "bsds_v1_test_2023-06-01t00--00--00.000z";
const V1_NEWEST: &str = "bsds_v1_test_2023-09-01t00--00--00.000z";
const URL: &str = "http://localhost:9200";

fn descriptor(version: &str) -> IndexDescriptor {
    IndexDescriptor::new(
        "bsds",
        version,
        "test",
        json!({ "properties": {} }),
        json!({ "number_of_shards": 1, "number_of_replicas": 1 }),
    )
    .unwrap()
}

fn orchestrator(
    store: Arc<dyn RecordStore>,
    search: Arc<InMemorySearchIndex>,
    chunk_size: usize,
) -> ReindexOrchestrator {
    ReindexOrchestrator::new(
        IndexLifecycleManager::new(search.clone(), &SearchIndexConfig::default()),
        IdCursorEnumerator::new(store.clone(), 100),
        Arc::new(BulkIndexer::new(store, search)),
        ChunkDispatcher::new(chunk_size, 2),
    )
}

fn queued_orchestrator(
    store: Arc<dyn RecordStore>,
    search: Arc<InMemorySearchIndex>,
) -> ReindexOrchestrator {
    let indexer = Arc::new(BulkIndexer::new(store.clone(), search.clone()));
    let queue = InProcessQueue::<IndexChunkJob>::start(
        QueueName::BulkIndex,
        3,
        Arc::new(ChunkJobHandler::new(indexer, URL)),
    );
    orchestrator(store, search, 2).with_chunk_queue(Arc::new(queue), URL, JobOptions::default())
}

fn catalog() -> Arc<SnapshotRecordStore> {
    let mut all = vec![
        record(DocumentType::Bsda, "a1", 1, 1),
        record(DocumentType::Bsda, "a2", 2, 1),
        record(DocumentType::Bsda, "a3", 3, 1),
    ];
    all.extend(records(DocumentType::Bsff, 1..=4, 1));
    Arc::new(SnapshotRecordStore::from_records(all))
}

fn bsda_ids(documents: &[RecordId]) -> Vec<RecordId> {
    documents
        .iter()
        .filter(|id| id.as_str().starts_with('a') || id.as_str().starts_with("BSDA"))
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_first_run_initializes_alias() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = orchestrator(catalog(), search.clone(), 2);

    let outcome = orchestrator
        .reindex_all(&descriptor("v1"), false, DispatchMode::Inline)
        .await
        .unwrap();

    let RebuildOutcome::Initialized { index, population } = outcome else {
        panic!("expected initialization, got {:?}", outcome);
    };
    assert_eq!(search.bound("bsds").await, vec![index.clone()]);
    assert_eq!(population.ids(), 7);
    assert_eq!(population.indexed, 7);
    assert_eq!(search.document_ids("bsds").await.len(), 7);
    assert!(search.deleted_indices().await.is_empty());
    assert_eq!(search.settings(&index).await["number_of_replicas"], 1);
}

#[tokio::test]
async fn test_current_index_is_left_alone_unless_forced() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = orchestrator(catalog(), search.clone(), 2);
    let d = descriptor("v1");
    orchestrator.reindex_all(&d, false, DispatchMode::Inline).await.unwrap();
    let bound = search.bound("bsds").await;

    let outcome = orchestrator.reindex_all(&d, false, DispatchMode::Inline).await.unwrap();
    assert_eq!(outcome, RebuildOutcome::AlreadyCurrent { bindings: bound.clone() });

    // Physical names carry millisecond timestamps.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let outcome = orchestrator.reindex_all(&d, true, DispatchMode::Inline).await.unwrap();
    let RebuildOutcome::Rebuilt { index, prune, .. } = outcome else {
        panic!("expected a forced rebuild, got {:?}", outcome);
    };
    assert_ne!(vec![index.clone()], bound);
    assert_eq!(search.bound("bsds").await, vec![index]);
    assert_eq!(prune.retained, bound.first().cloned());
}

#[tokio::test]
async fn test_mapping_bump_rebuilds_and_retains_one_old_index() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_index(V1_OLDEST).await;
    search.seed_index(V1_OLDER).await;
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    let store = Arc::new(SnapshotRecordStore::from_records(vec![
        record(DocumentType::Bsda, "a1", 1, 1),
        record(DocumentType::Bsda, "a2", 2, 1),
        record(DocumentType::Bsda, "a3", 3, 1),
    ]));
    let orchestrator = orchestrator(store, search.clone(), 2);

    let outcome = orchestrator
        .reindex_all(&descriptor("v2"), false, DispatchMode::Inline)
        .await
        .unwrap();

    let RebuildOutcome::Rebuilt { index, population, prune, .. } = outcome else {
        panic!("expected a rebuild, got {:?}", outcome);
    };
    assert!(index.starts_with("bsds_v2_test_"));
    assert_eq!(search.bound("bsds").await, vec![index.clone()]);
    assert_eq!(
        search.document_ids("bsds").await,
        vec![RecordId::from("a1"), RecordId::from("a2"), RecordId::from("a3")]
    );
    assert_eq!(population.per_type[1], (DocumentType::Bsda, 3));

    // The alias moved in a single request.
    let updates = search.alias_updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].len(), 2);

    let v1: Vec<String> = search
        .index_names()
        .await
        .into_iter()
        .filter(|name| name.starts_with("bsds_v1_"))
        .collect();
    assert_eq!(v1, vec![V1_NEWEST.to_string()]);
    assert_eq!(prune.retained.as_deref(), Some(V1_NEWEST));
    assert_eq!(prune.deleted.len(), 2);
    assert_eq!(search.settings(&index).await["refresh_interval"], "1s");
}

#[tokio::test]
async fn test_double_binding_is_collapsed_onto_one_index() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_bound_index(V1_OLDER, "bsds").await;
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    let orchestrator = orchestrator(catalog(), search.clone(), 2);

    let outcome = orchestrator
        .reindex_all(&descriptor("v1"), false, DispatchMode::Inline)
        .await
        .unwrap();

    let RebuildOutcome::Rebuilt { index, prune, .. } = outcome else {
        panic!("expected a rebuild, got {:?}", outcome);
    };
    assert_eq!(search.bound("bsds").await, vec![index]);
    assert_eq!(prune.detached.len(), 2);
    assert_eq!(prune.retained.as_deref(), Some(V1_NEWEST));
    assert_eq!(prune.deleted, vec![V1_OLDER.to_string()]);
}

/// Simulates a live write landing behind the enumeration frontier while a
/// pass is running.
struct InterleavedStore {
    inner: Arc<SnapshotRecordStore>,
    trigger: RecordId,
    write: Mutex<Option<LiveWrite>>,
}

enum LiveWrite {
    Upsert(BsdRecord),
    SoftDelete(DocumentType, RecordId),
}

#[async_trait]
impl RecordStore for InterleavedStore {
    async fn fetch_id_page(
        &self,
        document_type: DocumentType,
        after: Option<Cursor>,
        since: Option<DateTime<Utc>>,
        include_deleted: bool,
        limit: usize,
    ) -> Result<Vec<IdRow>, RecordStoreError> {
        self.inner
            .fetch_id_page(document_type, after, since, include_deleted, limit)
            .await
    }

    async fn fetch_records(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
        relations: &[&str],
    ) -> Result<Vec<BsdRecord>, RecordStoreError> {
        if ids.contains(&self.trigger) {
            match self.write.lock().await.take() {
                Some(LiveWrite::Upsert(mut write)) => {
                    write.updated_at = Utc::now();
                    self.inner.upsert(write).await;
                }
                Some(LiveWrite::SoftDelete(document_type, id)) => {
                    self.inner.soft_delete(document_type, &id, Utc::now()).await;
                }
                None => {}
            }
        }
        self.inner.fetch_records(document_type, ids, relations).await
    }
}

#[tokio::test]
async fn test_catch_up_picks_up_writes_made_during_the_pass() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    let inner = Arc::new(SnapshotRecordStore::from_records(records(
        DocumentType::Bsda,
        1..=3,
        1,
    )));
    let mut update = record(DocumentType::Bsda, "BSDA-1", 1, 1);
    update.data["status"] = json!("PROCESSED");
    let store = Arc::new(InterleavedStore {
        inner,
        trigger: RecordId::from("BSDA-3"),
        write: Mutex::new(Some(LiveWrite::Upsert(update))),
    });
    // One id per chunk: BSDA-1 is indexed before the write lands.
    let orchestrator = orchestrator(store, search.clone(), 1);

    let outcome = orchestrator
        .reindex_all(&descriptor("v2"), false, DispatchMode::Inline)
        .await
        .unwrap();

    let RebuildOutcome::Rebuilt { catch_up, .. } = outcome else {
        panic!("expected a rebuild, got {:?}", outcome);
    };
    assert_eq!(catch_up.ids(), 1);
    let doc = search.document("bsds", "BSDA-1").await.unwrap();
    assert_eq!(doc["status"], "PROCESSED");
    assert_eq!(search.document_ids("bsds").await, ids("BSDA", 1..=3));
}

#[tokio::test]
async fn test_catch_up_removes_records_deleted_during_the_pass() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    let inner = Arc::new(SnapshotRecordStore::from_records(records(
        DocumentType::Bsda,
        1..=3,
        1,
    )));
    let store = Arc::new(InterleavedStore {
        inner: inner.clone(),
        trigger: RecordId::from("BSDA-3"),
        write: Mutex::new(Some(LiveWrite::SoftDelete(
            DocumentType::Bsda,
            RecordId::from("BSDA-1"),
        ))),
    });
    let orchestrator = orchestrator(store, search.clone(), 1);

    let outcome = orchestrator
        .reindex_all(&descriptor("v2"), false, DispatchMode::Inline)
        .await
        .unwrap();

    let RebuildOutcome::Rebuilt { catch_up, .. } = outcome else {
        panic!("expected a rebuild, got {:?}", outcome);
    };
    assert_eq!(catch_up.ids(), 1);
    assert_eq!(catch_up.removed, 1);
    assert_eq!(inner.count(DocumentType::Bsda).await, 2);
    assert_eq!(
        search.document_ids("bsds").await,
        vec![RecordId::from("BSDA-2"), RecordId::from("BSDA-3")]
    );
}

#[tokio::test]
async fn test_failed_population_leaves_alias_and_orphan() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    search.fail_bulk_upserts(true);
    let orchestrator = orchestrator(catalog(), search.clone(), 2);

    let result = orchestrator
        .reindex_all(&descriptor("v2"), false, DispatchMode::Inline)
        .await;

    assert!(matches!(result, Err(PipelineError::SearchIndex(_))));
    assert_eq!(search.bound("bsds").await, vec![V1_NEWEST.to_string()]);
    let orphan = search
        .index_names()
        .await
        .into_iter()
        .find(|name| name.starts_with("bsds_v2_"))
        .unwrap();
    // Settings are restored even though population failed.
    assert_eq!(search.settings(&orphan).await["number_of_replicas"], 1);
    assert!(search.alias_updates().await.is_empty());
}

#[tokio::test]
async fn test_queue_mode_rebuild() {
    let search = Arc::new(InMemorySearchIndex::new());
    search.seed_bound_index(V1_NEWEST, "bsds").await;
    let orchestrator = queued_orchestrator(catalog(), search.clone());

    let outcome = orchestrator
        .reindex_all(&descriptor("v2"), false, DispatchMode::Queue)
        .await
        .unwrap();

    let RebuildOutcome::Rebuilt { population, .. } = outcome else {
        panic!("expected a rebuild, got {:?}", outcome);
    };
    // 3 BSDA ids and 4 BSFF ids in chunks of 2.
    assert_eq!(population.jobs, 4);
    assert_eq!(population.indexed, 0);
    assert_eq!(search.document_ids("bsds").await.len(), 7);
}

#[tokio::test]
async fn test_queue_mode_without_queue_is_a_config_error() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = orchestrator(catalog(), search.clone(), 2);

    let err = orchestrator
        .reindex_all(&descriptor("v1"), false, DispatchMode::Queue)
        .await
        .unwrap_err();

    assert!(err.is_config());
}

#[tokio::test]
async fn test_rebuild_job_runs_through_master_queue() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = Arc::new(queued_orchestrator(catalog(), search.clone()));
    let master = InProcessQueue::<RebuildJob>::start(
        QueueName::BulkIndexMaster,
        1,
        Arc::new(RebuildJobHandler::new(orchestrator)),
    );

    let ticket = master
        .enqueue(
            RebuildJob {
                index: descriptor("v1"),
                force: false,
            },
            JobOptions::with_timeout(Duration::from_secs(30)),
        )
        .await
        .unwrap();
    ticket.finished().await.unwrap();

    assert_eq!(search.bound("bsds").await.len(), 1);
    assert_eq!(search.document_ids("bsds").await.len(), 7);
}

/// Binds the alias to an index already holding documents of both types.
async fn populated(search: &Arc<InMemorySearchIndex>) -> ReindexOrchestrator {
    let store = catalog();
    let orchestrator = orchestrator(store, search.clone(), 2);
    orchestrator
        .reindex_all(&descriptor("v1"), false, DispatchMode::Inline)
        .await
        .unwrap();
    let stray = BsdDocument {
        id: RecordId::from("a99"),
        document_type: DocumentType::Bsda,
        readable_id: "a99".to_string(),
        status: "SENT".to_string(),
        is_draft: false,
        waste_code: None,
        sirets: Vec::new(),
        created_at: day(1),
        updated_at: day(1),
    };
    search.bulk_upsert("bsds", &[stray]).await.unwrap();
    orchestrator
}

#[tokio::test]
async fn test_in_place_force_deletes_only_the_requested_type() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = populated(&search).await;
    let bsff_before = search.document("bsds", "BSFF-1").await;

    let outcome = orchestrator
        .reindex_in_place(
            &descriptor("v1"),
            &InPlaceRequest {
                document_type: Some(DocumentType::Bsda),
                since: None,
                force: true,
            },
            DispatchMode::Inline,
        )
        .await
        .unwrap();

    assert_eq!(outcome.deleted, Some(4));
    assert_eq!(outcome.population.per_type, vec![(DocumentType::Bsda, 3)]);
    assert!(outcome.pending.is_empty());
    let documents = search.document_ids("bsds").await;
    assert_eq!(
        bsda_ids(&documents),
        vec![RecordId::from("a1"), RecordId::from("a2"), RecordId::from("a3")]
    );
    assert_eq!(documents.len(), 7);
    assert_eq!(search.document("bsds", "BSFF-1").await, bsff_before);
}

#[tokio::test]
async fn test_in_place_since_never_deletes() {
    let search = Arc::new(InMemorySearchIndex::new());
    search
        .seed_bound_index("bsds_v1_test_2024-01-01t00--00--00.000z", "bsds")
        .await;
    let store = Arc::new(SnapshotRecordStore::from_records(vec![
        record(DocumentType::Bsda, "a1", 1, 1),
        record(DocumentType::Bsda, "a2", 2, 6),
    ]));
    let orchestrator = orchestrator(store, search.clone(), 2);
    // Indexed earlier by live traffic, outside the `since` window.
    orchestrator
        .index_live(&descriptor("v1"), DocumentType::Bsda, &[RecordId::from("a1")])
        .await
        .unwrap();

    for force in [false, true] {
        let outcome = orchestrator
            .reindex_in_place(
                &descriptor("v1"),
                &InPlaceRequest {
                    document_type: Some(DocumentType::Bsda),
                    since: Some(day(5)),
                    force,
                },
                DispatchMode::Inline,
            )
            .await
            .unwrap();
        assert_eq!(outcome.deleted, None);
        assert_eq!(outcome.population.ids(), 1);
    }

    assert_eq!(
        search.document_ids("bsds").await,
        vec![RecordId::from("a1"), RecordId::from("a2")]
    );
}

#[tokio::test]
async fn test_in_place_unscoped_force_repopulates_everything() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = populated(&search).await;

    let outcome = orchestrator
        .reindex_in_place(
            &descriptor("v1"),
            &InPlaceRequest {
                force: true,
                ..InPlaceRequest::default()
            },
            DispatchMode::Inline,
        )
        .await
        .unwrap();

    assert_eq!(outcome.deleted, Some(8));
    assert_eq!(outcome.population.ids(), 7);
    assert!(!search
        .document_ids("bsds")
        .await
        .contains(&RecordId::from("a99")));
}

#[tokio::test]
async fn test_in_place_queue_mode_returns_pending_jobs() {
    let search = Arc::new(InMemorySearchIndex::new());
    search
        .seed_bound_index("bsds_v1_test_2024-01-01t00--00--00.000z", "bsds")
        .await;
    let orchestrator = queued_orchestrator(catalog(), search.clone());

    let outcome = orchestrator
        .reindex_in_place(
            &descriptor("v1"),
            &InPlaceRequest {
                document_type: Some(DocumentType::Bsff),
                ..InPlaceRequest::default()
            },
            DispatchMode::Queue,
        )
        .await
        .unwrap();

    assert_eq!(outcome.pending.len(), 2);
    ChunkDispatcher::wait_for_completion(outcome.pending)
        .await
        .unwrap();
    assert_eq!(search.document_ids("bsds").await, ids("BSFF", 1..=4));
}

#[tokio::test]
async fn test_in_place_requires_a_single_binding() {
    let search = Arc::new(InMemorySearchIndex::new());
    let orchestrator = orchestrator(catalog(), search.clone(), 2);

    let err = orchestrator
        .reindex_in_place(&descriptor("v1"), &InPlaceRequest::default(), DispatchMode::Inline)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::AliasNotBound { count: 0, .. }));
}
