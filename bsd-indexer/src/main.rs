use std::process;

use bsd_index_pipeline::{
    ChunkDispatcher, DispatchMode, InPlaceOutcome, InPlaceRequest, JobOptions, JobQueue,
    PipelineError, RebuildJob, RebuildOutcome,
};
use bsd_index_shared::DocumentType;
use bsd_indexer::config::REBUILD_JOB_TIMEOUT;
use bsd_indexer::{logging, Cli, Command, Dependencies, IndexerConfig, IndexingError};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Indexer command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), IndexingError> {
    let config = IndexerConfig::from_env()?;
    let deps = Dependencies::new(config).await?;

    match cli.command {
        Command::ReindexAll { force, use_queue } => reindex_all(&deps, force, use_queue).await,
        Command::ReindexPartial {
            bsd_type,
            since,
            force,
            use_queue,
        } => reindex_in_place(&deps, Some(bsd_type), since, force, use_queue).await,
        Command::ReindexInPlace {
            since,
            force,
            use_queue,
        } => reindex_in_place(&deps, None, since, force, use_queue).await,
        Command::Status => status(&deps).await,
        Command::QueueStats => {
            queue_stats(&deps);
            Ok(())
        }
    }
}

fn mode(use_queue: bool) -> DispatchMode {
    if use_queue {
        DispatchMode::Queue
    } else {
        DispatchMode::Inline
    }
}

async fn reindex_all(deps: &Dependencies, force: bool, use_queue: bool) -> Result<(), IndexingError> {
    if use_queue {
        let ticket = deps
            .master_queue
            .enqueue(
                RebuildJob {
                    index: deps.descriptor.clone(),
                    force,
                },
                JobOptions {
                    max_attempts: 1,
                    ..JobOptions::with_timeout(REBUILD_JOB_TIMEOUT)
                },
            )
            .await
            .map_err(PipelineError::from)?;
        info!(job_id = %ticket.id, "Rebuild job enqueued, waiting for completion");
        ticket
            .finished()
            .await
            .map_err(PipelineError::from)?;
        println!("Rebuild job completed");
        return Ok(());
    }

    let outcome = deps
        .orchestrator
        .reindex_all(&deps.descriptor, force, DispatchMode::Inline)
        .await?;

    match outcome {
        RebuildOutcome::AlreadyCurrent { bindings } => {
            println!(
                "Index {} is current ({}), nothing to do. Use --force to rebuild.",
                deps.descriptor.alias,
                bindings.join(", ")
            );
        }
        RebuildOutcome::Initialized { index, population } => {
            println!("Initialized {} -> {}", deps.descriptor.alias, index);
            println!("  indexed {} documents", population.indexed);
        }
        RebuildOutcome::Rebuilt {
            index,
            population,
            catch_up,
            prune,
        } => {
            println!("Rebuilt {} -> {}", deps.descriptor.alias, index);
            println!("  indexed {} documents", population.indexed);
            println!("  caught up {} documents updated during the rebuild", catch_up.indexed);
            if let Some(retained) = prune.retained {
                println!("  kept {} for rollback", retained);
            }
            for deleted in &prune.deleted {
                println!("  deleted {}", deleted);
            }
            for failed in &prune.failed {
                println!("  could not delete {}", failed);
            }
        }
    }
    Ok(())
}

async fn reindex_in_place(
    deps: &Dependencies,
    document_type: Option<DocumentType>,
    since: Option<DateTime<Utc>>,
    force: bool,
    use_queue: bool,
) -> Result<(), IndexingError> {
    let request = InPlaceRequest {
        document_type,
        since,
        force,
    };
    let InPlaceOutcome {
        index,
        deleted,
        population,
        pending,
    } = deps
        .orchestrator
        .reindex_in_place(&deps.descriptor, &request, mode(use_queue))
        .await?;

    println!("Reindexing in place into {}", index);
    if let Some(deleted) = deleted {
        println!("  deleted {} documents first", deleted);
    }
    for (document_type, count) in &population.per_type {
        println!("  {}: {} records", document_type, count);
    }

    if !pending.is_empty() {
        // Workers live in this process; stay up until they drain.
        println!("  {} chunk jobs enqueued", pending.len());
        ChunkDispatcher::wait_for_completion(pending).await?;
    }
    println!("Done");
    Ok(())
}

async fn status(deps: &Dependencies) -> Result<(), IndexingError> {
    let status = deps
        .orchestrator
        .lifecycle()
        .status(&deps.descriptor)
        .await?;

    println!("Alias:           {}", status.alias);
    println!("Mapping version: {}", status.mapping_version);
    println!("Environment:     {}", status.environment);
    println!(
        "Bound to:        {}",
        if status.bindings.is_empty() {
            "-".to_string()
        } else {
            status.bindings.join(", ")
        }
    );
    println!("Stale:           {}", status.stale);
    println!("Physical indices (newest first):");
    for index in &status.physical_indices {
        println!("  {}", index);
    }
    Ok(())
}

fn queue_stats(deps: &Dependencies) {
    for (name, stats) in deps.queue_stats() {
        println!(
            "{}: waiting={} active={} completed={} failed={}",
            name, stats.waiting, stats.active, stats.completed, stats.failed
        );
    }
}
