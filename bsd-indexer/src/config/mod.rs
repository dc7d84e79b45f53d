//! Process configuration.
//!
//! Every setting is read once, at startup, from the environment (after
//! `.env` has been loaded) and then passed down explicitly.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bsd_index_repository::IndexDescriptor;

use crate::IndexingError;

const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_INDEX_ALIAS: &str = "bsds";
const DEFAULT_DEPLOY_ENV: &str = "dev";
const DEFAULT_SNAPSHOT_PATH: &str = "bsds.ndjson";
const DEFAULT_CHUNK_SIZE: usize = 100;
const DEFAULT_ENQUEUE_BATCH_SIZE: usize = 5;
const DEFAULT_SCROLL_SIZE: usize = 100_000;
const DEFAULT_JOB_CONCURRENCY: usize = 1;
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound of a bulk request accepted by the search client.
pub const MAX_CHUNK_SIZE: usize = 1000;

/// Timeout of the top-level rebuild job.
pub const REBUILD_JOB_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub alias: String,
    pub environment: String,
    pub snapshot_path: PathBuf,
    pub chunk_size: usize,
    pub enqueue_batch_size: usize,
    pub scroll_size: usize,
    pub job_concurrency: usize,
    pub job_timeout: Duration,
    pub max_attempts: u32,
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `BSD_INDEX_ALIAS`: alias of the index family (default: bsds)
    /// - `DEPLOY_ENV`: environment component of physical index names (default: dev)
    /// - `BSD_SNAPSHOT_PATH`: record snapshot file (default: bsds.ndjson)
    /// - `BULK_INDEX_BATCH_SIZE`: ids per chunk (default: 100)
    /// - `BULK_INDEX_ENQUEUE_BATCH_SIZE`: jobs submitted together (default: 5)
    /// - `BULK_INDEX_SCROLL_SIZE`: ids per cursor page (default: 100000)
    /// - `BULK_INDEX_JOB_CONCURRENCY`: workers per queue (default: 1)
    /// - `BULK_INDEX_JOB_TIMEOUT_SECS`: chunk job timeout (default: 600)
    /// - `BULK_INDEX_MAX_ATTEMPTS`: attempts per job (default: 3)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            opensearch_url: string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            alias: string("BSD_INDEX_ALIAS", DEFAULT_INDEX_ALIAS),
            environment: string("DEPLOY_ENV", DEFAULT_DEPLOY_ENV),
            snapshot_path: PathBuf::from(string("BSD_SNAPSHOT_PATH", DEFAULT_SNAPSHOT_PATH)),
            chunk_size: positive(&lookup, "BULK_INDEX_BATCH_SIZE", DEFAULT_CHUNK_SIZE)?,
            enqueue_batch_size: positive(
                &lookup,
                "BULK_INDEX_ENQUEUE_BATCH_SIZE",
                DEFAULT_ENQUEUE_BATCH_SIZE,
            )?,
            scroll_size: positive(&lookup, "BULK_INDEX_SCROLL_SIZE", DEFAULT_SCROLL_SIZE)?,
            job_concurrency: positive(&lookup, "BULK_INDEX_JOB_CONCURRENCY", DEFAULT_JOB_CONCURRENCY)?,
            job_timeout: Duration::from_secs(positive(
                &lookup,
                "BULK_INDEX_JOB_TIMEOUT_SECS",
                DEFAULT_JOB_TIMEOUT_SECS,
            )?),
            max_attempts: positive(&lookup, "BULK_INDEX_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
        };

        if config.chunk_size > MAX_CHUNK_SIZE {
            return Err(IndexingError::config(format!(
                "BULK_INDEX_BATCH_SIZE is {}, the bulk request limit is {}",
                config.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        // Fail at startup rather than produce names that do not parse back.
        config.descriptor()?;

        Ok(config)
    }

    /// The descriptor of the configured index family.
    pub fn descriptor(&self) -> Result<IndexDescriptor, IndexingError> {
        Ok(IndexDescriptor::bsds(self.alias.as_str(), self.environment.as_str())?)
    }
}

/// Parse a strictly positive integer variable, falling back to `default` when unset.
fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, IndexingError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| IndexingError::config(format!("{} must be an integer, got {:?}", key, raw)))?;
    if value == T::default() {
        return Err(IndexingError::config(format!("{} must be greater than 0", key)));
    }
    Ok(value)
}
