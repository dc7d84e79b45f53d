//! Index descriptor and the physical index naming grammar.
//!
//! A physical index name is
//! `{alias}_{mapping_version}_{environment}_{timestamp}` where the timestamp
//! is a lower-cased ISO-8601 instant with `:` replaced by `--`, e.g.
//! `bsds_1.1.0_prod_2024-03-01t08--15--00.000z`.
//!
//! Cleanup ordering and mapping staleness detection both parse names back
//! into their components, so neither separator may appear inside the alias,
//! version or environment. [`IndexDescriptor::new`] rejects such values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::NamingError;
use crate::opensearch::{bsd_index_mappings, bsd_index_settings, BSD_MAPPING_VERSION};

/// Separates the components of a physical index name.
pub const INDEX_NAME_SEPARATOR: &str = "_";

/// Replaces `:` in the timestamp component of a physical index name.
pub const INDEX_DATETIME_SEPARATOR: &str = "--";

/// Describes one index family: its stable alias, the current mapping version
/// and the schema applied to every physical index created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub alias: String,
    pub mapping_version: String,
    pub environment: String,
    pub mappings: Value,
    pub settings: Value,
}

impl IndexDescriptor {
    /// Build a descriptor, rejecting components that would corrupt name parsing.
    pub fn new(
        alias: impl Into<String>,
        mapping_version: impl Into<String>,
        environment: impl Into<String>,
        mappings: Value,
        settings: Value,
    ) -> Result<Self, NamingError> {
        let descriptor = Self {
            alias: alias.into(),
            mapping_version: mapping_version.into(),
            environment: environment.into(),
            mappings,
            settings,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// The descriptor of the BSD index family, using the current mapping.
    pub fn bsds(
        alias: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, NamingError> {
        Self::new(
            alias,
            BSD_MAPPING_VERSION,
            environment,
            bsd_index_mappings(),
            bsd_index_settings(),
        )
    }

    /// Check every name component against the grammar.
    ///
    /// Descriptors received through job payloads must be re-validated.
    pub fn validate(&self) -> Result<(), NamingError> {
        validate_component("alias", &self.alias)?;
        validate_component("mapping version", &self.mapping_version)?;
        validate_component("environment", &self.environment)?;
        Ok(())
    }

    /// The physical index name for an index created at `timestamp`.
    pub fn physical_name(&self, timestamp: DateTime<Utc>) -> String {
        let timestamp = timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace(':', INDEX_DATETIME_SEPARATOR)
            .to_lowercase();

        [
            self.alias.as_str(),
            self.mapping_version.as_str(),
            self.environment.as_str(),
            timestamp.as_str(),
        ]
        .join(INDEX_NAME_SEPARATOR)
    }

    /// Wildcard pattern matching every physical index of this alias.
    pub fn name_pattern(&self) -> String {
        format!("{}{}*", self.alias, INDEX_NAME_SEPARATOR)
    }

    /// Whether a physical index belongs to this family in this environment.
    pub fn owns(&self, name: &PhysicalIndexName) -> bool {
        name.alias == self.alias && name.environment == self.environment
    }
}

fn validate_component(component: &'static str, value: &str) -> Result<(), NamingError> {
    if value.is_empty() {
        return Err(NamingError::EmptyComponent { component });
    }
    for separator in [INDEX_NAME_SEPARATOR, INDEX_DATETIME_SEPARATOR] {
        if value.contains(separator) {
            return Err(NamingError::ReservedSeparator {
                component,
                value: value.to_string(),
                separator,
            });
        }
    }
    if value.chars().any(|c| c.is_uppercase()) {
        return Err(NamingError::NotLowercase {
            component,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A physical index name parsed back into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalIndexName {
    pub name: String,
    pub alias: String,
    pub mapping_version: String,
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

impl PhysicalIndexName {
    pub fn parse(name: &str) -> Result<Self, NamingError> {
        let invalid = |reason: &str| NamingError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = name.split(INDEX_NAME_SEPARATOR).collect();
        let [alias, mapping_version, environment, timestamp] = parts.as_slice() else {
            return Err(invalid("expected 4 components"));
        };

        let iso = timestamp
            .replace(INDEX_DATETIME_SEPARATOR, ":")
            .to_uppercase();
        let created_at = DateTime::parse_from_rfc3339(&iso)
            .map_err(|e| invalid(&format!("bad timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(Self {
            name: name.to_string(),
            alias: alias.to_string(),
            mapping_version: mapping_version.to_string(),
            environment: environment.to_string(),
            created_at,
        })
    }
}
