//! Reindex orchestration.
//!
//! Drives the index family through its states:
//!
//! - **No alias**: declare an index, bind the alias to it, populate it.
//! - **Current**: nothing to do unless forced.
//! - **Stale** (or forced): declare a new index while the alias keeps
//!   serving the old one, populate it, run a catch-up pass over records
//!   changed (or soft-deleted) since the population started, then switch
//!   the alias and prune.
//!
//! In-place reindexes write into the index currently behind the alias and
//! accept a window of incomplete reads; they have no catch-up pass.
//!
//! Failures propagate unfiltered. A failed rebuild leaves its new index in
//! place, unbound, for inspection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bsd_index_repository::IndexDescriptor;
use bsd_index_shared::{DocumentType, RecordId};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::dispatcher::ChunkDispatcher;
use crate::enumerator::{IdCursorEnumerator, IdPages};
use crate::errors::PipelineError;
use crate::indexer::{BulkIndexer, IndexSummary};
use crate::jobs::IndexChunkJob;
use crate::lifecycle::{IndexLifecycleManager, IndexState, PruneReport};
use crate::queue::{JobOptions, JobQueue, JobTicket};

/// How chunks are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// In the calling task, one chunk at a time.
    Inline,
    /// As jobs on the chunk queue.
    Queue,
}

/// Counts for one population pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSummary {
    /// Ids enumerated, per document type.
    pub per_type: Vec<(DocumentType, usize)>,
    /// Documents written inline.
    pub indexed: usize,
    /// Documents removed inline because their record was deleted.
    pub removed: usize,
    /// Chunk jobs enqueued.
    pub jobs: usize,
}

impl PopulationSummary {
    pub fn ids(&self) -> usize {
        self.per_type.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The alias already serves the current mapping version.
    AlreadyCurrent { bindings: Vec<String> },
    /// First index of the family.
    Initialized {
        index: String,
        population: PopulationSummary,
    },
    /// The alias was moved onto a freshly populated index.
    Rebuilt {
        index: String,
        population: PopulationSummary,
        catch_up: PopulationSummary,
        prune: PruneReport,
    },
}

/// Parameters of an in-place reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InPlaceRequest {
    /// Restrict to one document type; every type when `None`.
    pub document_type: Option<DocumentType>,
    /// Only records updated at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Delete the scope's documents before repopulating. Ignored with `since`.
    pub force: bool,
}

#[derive(Debug)]
pub struct InPlaceOutcome {
    /// Physical index written.
    pub index: String,
    /// Documents deleted before repopulating, if a delete ran.
    pub deleted: Option<u64>,
    pub population: PopulationSummary,
    /// Chunk jobs still running when dispatched through the queue.
    pub pending: Vec<JobTicket>,
}

/// Which ids a population pass enumerates.
#[derive(Debug, Clone, Copy)]
enum Pass {
    Full,
    UpdatedSince(DateTime<Utc>),
    /// Updated or soft-deleted since; deleted ids get removed from the target.
    ChangesSince(DateTime<Utc>),
}

impl Pass {
    fn pages(self, enumerator: &IdCursorEnumerator, document_type: DocumentType) -> IdPages {
        match self {
            Pass::Full => enumerator.enumerate(document_type, None),
            Pass::UpdatedSince(since) => enumerator.enumerate(document_type, Some(since)),
            Pass::ChangesSince(since) => enumerator.enumerate_changes(document_type, since),
        }
    }
}

struct ChunkQueue {
    queue: Arc<dyn JobQueue<IndexChunkJob>>,
    target_url: String,
    options: JobOptions,
}

pub struct ReindexOrchestrator {
    lifecycle: IndexLifecycleManager,
    enumerator: IdCursorEnumerator,
    indexer: Arc<BulkIndexer>,
    dispatcher: ChunkDispatcher,
    chunk_queue: Option<ChunkQueue>,
}

impl ReindexOrchestrator {
    pub fn new(
        lifecycle: IndexLifecycleManager,
        enumerator: IdCursorEnumerator,
        indexer: Arc<BulkIndexer>,
        dispatcher: ChunkDispatcher,
    ) -> Self {
        Self {
            lifecycle,
            enumerator,
            indexer,
            dispatcher,
            chunk_queue: None,
        }
    }

    /// Enable [`DispatchMode::Queue`]. Chunk jobs are stamped with `target_url`.
    pub fn with_chunk_queue(
        mut self,
        queue: Arc<dyn JobQueue<IndexChunkJob>>,
        target_url: impl Into<String>,
        options: JobOptions,
    ) -> Self {
        self.chunk_queue = Some(ChunkQueue {
            queue,
            target_url: target_url.into(),
            options,
        });
        self
    }

    pub fn lifecycle(&self) -> &IndexLifecycleManager {
        &self.lifecycle
    }

    /// Rebuild the index family if it is missing, stale or `force` is set.
    #[instrument(skip(self, descriptor), fields(alias = %descriptor.alias, version = %descriptor.mapping_version))]
    pub async fn reindex_all(
        &self,
        descriptor: &IndexDescriptor,
        force: bool,
        mode: DispatchMode,
    ) -> Result<RebuildOutcome, PipelineError> {
        match self.lifecycle.state(descriptor).await? {
            IndexState::NoAlias => self.initialize(descriptor, mode).await,
            IndexState::Current { bindings } if !force => {
                info!(bindings = ?bindings, "Index is current, nothing to rebuild");
                Ok(RebuildOutcome::AlreadyCurrent { bindings })
            }
            state => {
                info!(bindings = ?state.bindings(), forced = force, "Rebuilding index");
                self.rebuild(descriptor, mode).await
            }
        }
    }

    async fn initialize(
        &self,
        descriptor: &IndexDescriptor,
        mode: DispatchMode,
    ) -> Result<RebuildOutcome, PipelineError> {
        let index = self.lifecycle.declare_new_index(descriptor).await?;

        let populated = async {
            self.lifecycle.attach_and_prune(descriptor, &index).await?;
            self.populate_and_wait(&index, &DocumentType::ALL, Pass::Full, mode)
                .await
        }
        .await;
        self.restore_settings(&index).await;

        let population = populated?;
        info!(index = %index, ids = population.ids(), "Index initialized");
        Ok(RebuildOutcome::Initialized { index, population })
    }

    async fn rebuild(
        &self,
        descriptor: &IndexDescriptor,
        mode: DispatchMode,
    ) -> Result<RebuildOutcome, PipelineError> {
        let index = self.lifecycle.declare_new_index(descriptor).await?;
        let pass_start = Utc::now();

        let rebuilt = async {
            let population = self
                .populate_and_wait(&index, &DocumentType::ALL, Pass::Full, mode)
                .await?;

            info!(since = %pass_start, "Starting catch-up pass");
            let catch_up = self
                .populate_and_wait(
                    &index,
                    &DocumentType::ALL,
                    Pass::ChangesSince(pass_start),
                    mode,
                )
                .await?;

            let prune = self.lifecycle.attach_and_prune(descriptor, &index).await?;
            Ok::<_, PipelineError>((population, catch_up, prune))
        }
        .await;
        self.restore_settings(&index).await;

        let (population, catch_up, prune) = rebuilt?;
        info!(
            index = %index,
            ids = population.ids(),
            catch_up_ids = catch_up.ids(),
            deleted = prune.deleted.len(),
            "Index rebuilt"
        );
        Ok(RebuildOutcome::Rebuilt {
            index,
            population,
            catch_up,
            prune,
        })
    }

    /// Replication and refresh only affect search parallelism; a failed
    /// restore is reported, not raised.
    async fn restore_settings(&self, index: &str) {
        if let Err(e) = self.lifecycle.restore_index_settings(index).await {
            warn!(index = %index, error = %e, "Failed to restore index settings");
        }
    }

    /// Reindex into the index currently bound to the alias.
    ///
    /// With `force` and no `since`, the scope's documents are deleted first.
    /// In queue mode the call returns once every chunk job is enqueued.
    #[instrument(skip(self, descriptor), fields(alias = %descriptor.alias))]
    pub async fn reindex_in_place(
        &self,
        descriptor: &IndexDescriptor,
        request: &InPlaceRequest,
        mode: DispatchMode,
    ) -> Result<InPlaceOutcome, PipelineError> {
        let bindings = self.lifecycle.alias_bindings(&descriptor.alias).await?;
        let [index] = bindings.as_slice() else {
            return Err(PipelineError::AliasNotBound {
                alias: descriptor.alias.clone(),
                count: bindings.len(),
            });
        };
        let index = index.clone();

        let deleted = match (request.force, request.since) {
            (true, None) => {
                let deleted = self.indexer.delete_all(&index, request.document_type).await?;
                info!(index = %index, deleted, "Deleted documents before reindex");
                Some(deleted)
            }
            (true, Some(since)) => {
                warn!(since = %since, "Skipping delete, time-filtered reindexes never delete");
                None
            }
            (false, _) => None,
        };

        let types = match request.document_type {
            Some(document_type) => vec![document_type],
            None => DocumentType::ALL.to_vec(),
        };
        let pass = request.since.map_or(Pass::Full, Pass::UpdatedSince);
        let (population, pending) = self.populate(&index, &types, pass, mode).await?;

        info!(
            index = %index,
            ids = population.ids(),
            pending_jobs = pending.len(),
            "In-place reindex dispatched"
        );
        Ok(InPlaceOutcome {
            index,
            deleted,
            population,
            pending,
        })
    }

    /// Index `ids` into whatever the alias currently resolves to.
    pub async fn index_live(
        &self,
        descriptor: &IndexDescriptor,
        document_type: DocumentType,
        ids: &[RecordId],
    ) -> Result<IndexSummary, PipelineError> {
        self.indexer
            .index(document_type, ids, &descriptor.alias)
            .await
    }

    async fn populate_and_wait(
        &self,
        index: &str,
        types: &[DocumentType],
        pass: Pass,
        mode: DispatchMode,
    ) -> Result<PopulationSummary, PipelineError> {
        let (summary, tickets) = self.populate(index, types, pass, mode).await?;
        if !tickets.is_empty() {
            info!(jobs = tickets.len(), "Waiting for chunk jobs");
            ChunkDispatcher::wait_for_completion(tickets).await?;
        }
        Ok(summary)
    }

    /// Enumerate every id of `types` and index them into `index`.
    async fn populate(
        &self,
        index: &str,
        types: &[DocumentType],
        pass: Pass,
        mode: DispatchMode,
    ) -> Result<(PopulationSummary, Vec<JobTicket>), PipelineError> {
        let chunk_queue = match mode {
            DispatchMode::Inline => None,
            DispatchMode::Queue => Some(self.chunk_queue.as_ref().ok_or_else(|| {
                PipelineError::config("queue dispatch requested but no chunk queue is configured")
            })?),
        };

        let mut summary = PopulationSummary::default();
        let mut tickets = Vec::new();
        let indexed = AtomicUsize::new(0);
        let removed = AtomicUsize::new(0);

        for &document_type in types {
            let mut pages = pass.pages(&self.enumerator, document_type);
            let mut count = 0;

            while let Some(page) = pages.next_page().await? {
                count += page.len();
                match chunk_queue {
                    None => {
                        let (indexer, indexed, removed) = (&self.indexer, &indexed, &removed);
                        self.dispatcher
                            .dispatch(&page, move |chunk| async move {
                                let chunk_summary = indexer.index(document_type, &chunk, index).await?;
                                indexed.fetch_add(chunk_summary.indexed, Ordering::Relaxed);
                                removed.fetch_add(chunk_summary.removed, Ordering::Relaxed);
                                Ok(())
                            })
                            .await?;
                    }
                    Some(chunk_queue) => {
                        let submitted = self
                            .dispatcher
                            .dispatch_via_queue(
                                &page,
                                chunk_queue.queue.as_ref(),
                                &chunk_queue.options,
                                |ids| IndexChunkJob {
                                    document_type,
                                    index: index.to_string(),
                                    ids,
                                    target_url: chunk_queue.target_url.clone(),
                                },
                            )
                            .await?;
                        tickets.extend(submitted);
                    }
                }
            }

            info!(document_type = %document_type, ids = count, "Document type dispatched");
            summary.per_type.push((document_type, count));
        }

        summary.indexed = indexed.into_inner();
        summary.removed = removed.into_inner();
        summary.jobs = tickets.len();
        Ok((summary, tickets))
    }
}

#[cfg(test)]
mod tests;
