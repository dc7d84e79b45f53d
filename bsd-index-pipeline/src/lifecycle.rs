//! Physical index lifecycle: creation, settings, alias binding and pruning.
//!
//! The alias is the only shared mutable state of the index family. It is
//! written through [`IndexLifecycleManager::attach_and_prune`] alone, with a
//! single `_aliases` request, so a reader never observes the alias bound to
//! zero or two indices.

use std::sync::Arc;

use bsd_index_repository::{
    AliasAction, IndexDescriptor, PhysicalIndexName, SearchIndexConfig, SearchIndexProvider,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::errors::PipelineError;

/// Where the alias stands relative to the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexState {
    /// The alias is not bound to any index.
    NoAlias,
    /// The alias is bound to exactly one index, carrying the descriptor's
    /// mapping version.
    Current { bindings: Vec<String> },
    /// The bound index carries another mapping version or a name that does
    /// not parse, or the alias is bound to more than one index.
    Stale { bindings: Vec<String> },
}

impl IndexState {
    pub fn is_stale(&self) -> bool {
        !matches!(self, IndexState::Current { .. })
    }

    pub fn bindings(&self) -> &[String] {
        match self {
            IndexState::NoAlias => &[],
            IndexState::Current { bindings } | IndexState::Stale { bindings } => bindings,
        }
    }
}

/// Outcome of [`IndexLifecycleManager::attach_and_prune`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Indices the alias was removed from.
    pub detached: Vec<String>,
    /// Rollback candidate kept next to the new index.
    pub retained: Option<String>,
    /// Older indices deleted.
    pub deleted: Vec<String>,
    /// Older indices whose deletion failed.
    pub failed: Vec<String>,
}

/// Operator view of an index family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub alias: String,
    pub mapping_version: String,
    pub environment: String,
    pub bindings: Vec<String>,
    pub stale: bool,
    /// Physical indices of this alias and environment, newest first.
    pub physical_indices: Vec<String>,
}

pub struct IndexLifecycleManager {
    search: Arc<dyn SearchIndexProvider>,
    number_of_replicas: u32,
    refresh_interval: String,
}

impl IndexLifecycleManager {
    pub fn new(search: Arc<dyn SearchIndexProvider>, config: &SearchIndexConfig) -> Self {
        Self {
            search,
            number_of_replicas: config.number_of_replicas,
            refresh_interval: config.refresh_interval.clone(),
        }
    }

    /// Create a physical index tuned for bulk writes and return its name.
    ///
    /// The index starts with no replicas and refresh disabled; call
    /// [`IndexLifecycleManager::restore_index_settings`] once it is populated.
    #[instrument(skip_all, fields(alias = %descriptor.alias))]
    pub async fn declare_new_index(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<String, PipelineError> {
        let mut settings = descriptor.settings.clone();
        let Some(overrides) = settings.as_object_mut() else {
            return Err(PipelineError::config(format!(
                "index settings of {} must be a JSON object",
                descriptor.alias
            )));
        };
        overrides.insert("number_of_replicas".to_string(), json!(0));
        overrides.insert("refresh_interval".to_string(), json!("-1"));

        let name = descriptor.physical_name(Utc::now());
        let body = json!({
            "settings": settings,
            "mappings": descriptor.mappings,
        });
        self.search.create_index(&name, &body).await?;

        info!(index = %name, "Declared new physical index");
        Ok(name)
    }

    /// Re-enable replication and refresh on a populated index.
    pub async fn restore_index_settings(&self, name: &str) -> Result<(), PipelineError> {
        self.search
            .put_index_settings(name, &self.restored_settings())
            .await?;
        info!(index = %name, "Restored index settings");
        Ok(())
    }

    fn restored_settings(&self) -> Value {
        json!({
            "number_of_replicas": self.number_of_replicas,
            "refresh_interval": self.refresh_interval,
        })
    }

    pub async fn alias_bindings(&self, alias: &str) -> Result<Vec<String>, PipelineError> {
        Ok(self.search.get_alias_bindings(alias).await?)
    }

    pub async fn state(&self, descriptor: &IndexDescriptor) -> Result<IndexState, PipelineError> {
        let bindings = self.alias_bindings(&descriptor.alias).await?;
        if bindings.is_empty() {
            return Ok(IndexState::NoAlias);
        }

        let current = match bindings.as_slice() {
            [name] => PhysicalIndexName::parse(name)
                .map(|parsed| parsed.mapping_version == descriptor.mapping_version)
                .unwrap_or(false),
            _ => false,
        };

        Ok(if current {
            IndexState::Current { bindings }
        } else {
            IndexState::Stale { bindings }
        })
    }

    /// True unless the alias is bound to a single index of the current mapping version.
    pub async fn is_mapping_version_stale(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<bool, PipelineError> {
        Ok(self.state(descriptor).await?.is_stale())
    }

    /// Move the alias onto `new_index`, then delete every older index of
    /// the family except the most recent one.
    ///
    /// The alias switch is one request carrying every remove and the add.
    /// Deletion failures are logged and reported, never raised.
    #[instrument(skip(self, descriptor), fields(alias = %descriptor.alias))]
    pub async fn attach_and_prune(
        &self,
        descriptor: &IndexDescriptor,
        new_index: &str,
    ) -> Result<PruneReport, PipelineError> {
        let detached = self.alias_bindings(&descriptor.alias).await?;

        let mut actions: Vec<AliasAction> = detached
            .iter()
            .map(|index| AliasAction::remove(index.as_str(), descriptor.alias.as_str()))
            .collect();
        actions.push(AliasAction::add(new_index, descriptor.alias.as_str()));
        self.search.update_aliases(&actions).await?;

        info!(index = %new_index, previous = ?detached, "Alias switched");

        let mut older = self
            .family(descriptor)
            .await?
            .into_iter()
            .filter(|index| index.name != new_index);

        let mut report = PruneReport {
            detached,
            ..PruneReport::default()
        };
        report.retained = older.next().map(|index| index.name);

        for index in older {
            match self.search.delete_index(&index.name).await {
                Ok(()) => {
                    info!(index = %index.name, "Deleted stale physical index");
                    report.deleted.push(index.name);
                }
                Err(e) => {
                    warn!(index = %index.name, error = %e, "Failed to delete stale physical index");
                    report.failed.push(index.name);
                }
            }
        }

        Ok(report)
    }

    /// Physical indices of this alias and environment, newest first.
    async fn family(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<Vec<PhysicalIndexName>, PipelineError> {
        let mut family: Vec<PhysicalIndexName> = self
            .search
            .list_indices(&descriptor.name_pattern())
            .await?
            .iter()
            .filter_map(|name| PhysicalIndexName::parse(name).ok())
            .filter(|name| descriptor.owns(name))
            .collect();
        family.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(family)
    }

    pub async fn status(&self, descriptor: &IndexDescriptor) -> Result<IndexStatus, PipelineError> {
        let state = self.state(descriptor).await?;
        let physical_indices = self
            .family(descriptor)
            .await?
            .into_iter()
            .map(|index| index.name)
            .collect();

        Ok(IndexStatus {
            alias: descriptor.alias.clone(),
            mapping_version: descriptor.mapping_version.clone(),
            environment: descriptor.environment.clone(),
            stale: state.is_stale(),
            bindings: state.bindings().to_vec(),
            physical_indices,
        })
    }
}
