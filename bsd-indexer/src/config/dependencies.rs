//! Dependency initialization and wiring for the BSD indexer.

use std::sync::Arc;

use tracing::info;

use crate::config::IndexerConfig;
use crate::IndexingError;
use bsd_index_pipeline::{
    BulkIndexer, ChunkDispatcher, ChunkJobHandler, IdCursorEnumerator, InProcessQueue,
    IndexChunkJob, IndexLifecycleManager, JobOptions, JobQueue, QueueName, QueueStats,
    RebuildJob, RebuildJobHandler, ReindexOrchestrator,
};
use bsd_index_repository::{
    IndexDescriptor, OpenSearchClient, SearchIndexConfig, SearchIndexProvider, SnapshotRecordStore,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub config: IndexerConfig,
    pub descriptor: IndexDescriptor,
    pub orchestrator: Arc<ReindexOrchestrator>,
    /// Per-chunk indexing jobs.
    pub chunk_queue: Arc<InProcessQueue<IndexChunkJob>>,
    /// Full rebuild jobs.
    pub master_queue: Arc<InProcessQueue<RebuildJob>>,
}

impl Dependencies {
    /// Connect to the search cluster, load the record snapshot and start the queues.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new(config: IndexerConfig) -> Result<Self, IndexingError> {
        let descriptor = config.descriptor()?;

        info!(
            opensearch_url = %config.opensearch_url,
            alias = %descriptor.alias,
            mapping_version = %descriptor.mapping_version,
            environment = %descriptor.environment,
            "Initializing dependencies"
        );

        let search_config = SearchIndexConfig::with_max_batch_size(config.chunk_size);
        let search_client = OpenSearchClient::new(&config.opensearch_url, search_config.clone())
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
            })?;

        // Verify OpenSearch is reachable
        let healthy = search_client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        // Chunk jobs only run against the cluster this process writes to.
        let target_url = search_client.url().to_string();
        let search: Arc<dyn SearchIndexProvider> = Arc::new(search_client);
        let store = Arc::new(SnapshotRecordStore::from_ndjson_file(&config.snapshot_path).await?);

        let indexer = Arc::new(BulkIndexer::new(store.clone(), search.clone()));
        let chunk_queue = Arc::new(InProcessQueue::<IndexChunkJob>::start(
            QueueName::BulkIndex,
            config.job_concurrency,
            Arc::new(ChunkJobHandler::new(indexer.clone(), target_url.as_str())),
        ));

        let chunk_job_options = JobOptions {
            timeout: config.job_timeout,
            max_attempts: config.max_attempts,
            ..JobOptions::default()
        };
        let orchestrator = Arc::new(
            ReindexOrchestrator::new(
                IndexLifecycleManager::new(search, &search_config),
                IdCursorEnumerator::new(store, config.scroll_size),
                indexer,
                ChunkDispatcher::new(config.chunk_size, config.enqueue_batch_size),
            )
            .with_chunk_queue(chunk_queue.clone(), target_url, chunk_job_options),
        );

        // One rebuild at a time.
        let master_queue = Arc::new(InProcessQueue::<RebuildJob>::start(
            QueueName::BulkIndexMaster,
            1,
            Arc::new(RebuildJobHandler::new(orchestrator.clone())),
        ));

        Ok(Self {
            config,
            descriptor,
            orchestrator,
            chunk_queue,
            master_queue,
        })
    }

    /// Counters of every queue, keyed by queue name.
    pub fn queue_stats(&self) -> Vec<(QueueName, QueueStats)> {
        QueueName::ALL
            .iter()
            .map(|&name| {
                let stats = match name {
                    QueueName::BulkIndex => self.chunk_queue.stats(),
                    QueueName::BulkIndexMaster => self.master_queue.stats(),
                };
                (name, stats)
            })
            .collect()
    }
}
