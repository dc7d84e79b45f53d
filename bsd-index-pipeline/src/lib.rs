//! # BSD Index Pipeline
//!
//! This crate projects authoritative BSD records into the search index and
//! manages the lifecycle of the physical indices behind the alias.
//!
//! ## Architecture
//!
//! 1. **Enumerator**: pages through record ids by cursor
//! 2. **Indexer**: loads records, projects them and upserts the documents
//! 3. **Dispatcher**: splits ids into chunks, processed inline or as queue jobs
//! 4. **Lifecycle**: creates, tunes, binds and prunes physical indices
//! 5. **Orchestrator**: full no-downtime rebuild, first-time initialization
//!    and in-place reindexes

pub mod dispatcher;
pub mod enumerator;
pub mod errors;
pub mod indexer;
pub mod jobs;
pub mod lifecycle;
pub mod orchestrator;
pub mod projection;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::ChunkDispatcher;
pub use enumerator::{IdCursorEnumerator, IdPages};
pub use errors::{PipelineError, QueueError};
pub use indexer::{BulkIndexer, IndexSummary};
pub use jobs::{ChunkJobHandler, IndexChunkJob, RebuildJob, RebuildJobHandler};
pub use lifecycle::{IndexLifecycleManager, IndexState, IndexStatus, PruneReport};
pub use orchestrator::{
    DispatchMode, InPlaceOutcome, InPlaceRequest, PopulationSummary, RebuildOutcome,
    ReindexOrchestrator,
};
pub use queue::{InProcessQueue, JobHandler, JobOptions, JobQueue, JobTicket, QueueName, QueueStats};
