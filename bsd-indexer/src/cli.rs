//! Command line definition.

use bsd_index_shared::DocumentType;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bsd-indexer")]
#[command(about = "Rebuild, reindex and inspect the BSD search index", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the whole index without downtime when its mapping is stale
    ReindexAll {
        /// Rebuild even if the aliased index is current
        #[arg(long)]
        force: bool,
        /// Run the rebuild and its chunks as queue jobs
        #[arg(long)]
        use_queue: bool,
    },
    /// Reindex one document type into the aliased index
    ReindexPartial {
        /// Document type to reindex (BSDD, BSDA, BSDASRI, BSFF, BSVHU, BSPAOH)
        #[arg(long)]
        bsd_type: DocumentType,
        /// Only records updated on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
        /// Delete the type's documents first
        #[arg(long, conflicts_with = "since")]
        force: bool,
        /// Dispatch chunks as queue jobs
        #[arg(long)]
        use_queue: bool,
    },
    /// Reindex every document type into the aliased index
    ReindexInPlace {
        /// Only records updated on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
        /// Delete every document first
        #[arg(long, conflicts_with = "since")]
        force: bool,
        /// Dispatch chunks as queue jobs
        #[arg(long)]
        use_queue: bool,
    },
    /// Print the alias bindings and physical indices
    Status,
    /// Print job queue counters
    QueueStats,
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 instant.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| format!("invalid date {:?}, expected YYYY-MM-DD or RFC 3339", value))
}
