//! Sync configuration (YAML schema v1)
//!
//! Everything a pass needs is carried by an explicit [`SyncConfig`] value:
//! the delivery endpoint and project, the index location, the cursor row and
//! the pass tuning knobs. Nothing is read from process-wide state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, ConfigResult};

/// Schema versions this build can read.
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// What to do when a single identity fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionFailurePolicy {
    /// Leave the identity out of this pass; the cursor still advances
    #[default]
    Skip,
    /// Fail the whole pass before any index mutation
    Abort,
}

/// How changed identities are mapped to resolution targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Resolve the changed identity itself
    #[default]
    Direct,
    /// Re-resolve the indexed documents that contain the changed item
    IndexedOwners,
}

/// Content delivery endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    pub base_url: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Linked-item depth requested when resolving a subtree
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Search index location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    pub path: PathBuf,
    #[serde(default = "default_writer_heap_bytes")]
    pub writer_heap_bytes: usize,
}

/// Cursor row location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CursorConfig {
    pub database_path: PathBuf,
    #[serde(default = "default_partition_key")]
    pub partition_key: String,
    #[serde(default = "default_row_key")]
    pub row_key: String,
}

/// Per-pass behaviour handed to the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassConfig {
    /// Element that marks an item as publicly addressable
    #[serde(default = "default_slug_attribute")]
    pub slug_attribute: String,
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
    #[serde(default)]
    pub resolution_failure_policy: ResolutionFailurePolicy,
    #[serde(default)]
    pub strategy: ResolutionStrategy,
    /// Collection allow-list; `None` accepts every collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            slug_attribute: default_slug_attribute(),
            resolve_concurrency: default_resolve_concurrency(),
            resolution_failure_policy: ResolutionFailurePolicy::default(),
            strategy: ResolutionStrategy::default(),
            collections: None,
        }
    }
}

impl PassConfig {
    pub const MAX_RESOLVE_CONCURRENCY: usize = 64;

    pub fn with_slug_attribute(mut self, slug_attribute: impl Into<String>) -> Self {
        self.slug_attribute = slug_attribute.into();
        self
    }

    pub fn with_concurrency(mut self, resolve_concurrency: usize) -> Self {
        self.resolve_concurrency = resolve_concurrency;
        self
    }

    pub fn with_failure_policy(mut self, policy: ResolutionFailurePolicy) -> Self {
        self.resolution_failure_policy = policy;
        self
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    pub fn allows_collection(&self, collection: &str) -> bool {
        match &self.collections {
            Some(allowed) => allowed.iter().any(|c| c == collection),
            None => true,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.slug_attribute.trim().is_empty() {
            return Err(ConfigError::EmptyField("pass.slug_attribute".to_string()));
        }
        if !(1..=Self::MAX_RESOLVE_CONCURRENCY).contains(&self.resolve_concurrency) {
            return Err(ConfigError::range_with_hint(
                "pass.resolve_concurrency",
                self.resolve_concurrency,
                1,
                Self::MAX_RESOLVE_CONCURRENCY,
                "Resolution fan-out must have at least one slot.",
            ));
        }
        if let Some(collections) = &self.collections {
            if collections.is_empty() {
                return Err(ConfigError::EmptyField("pass.collections".to_string()));
            }
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Schema version (always 1 for v1)
    pub version: u32,
    pub delivery: DeliveryConfig,
    pub index: IndexConfig,
    pub cursor: CursorConfig,
    #[serde(default)]
    pub pass: PassConfig,
}

impl SyncConfig {
    pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;
    pub const MAX_WRITER_HEAP_BYTES: usize = 2_000_000_000;
    pub const MAX_DEPTH: u32 = 10;
    pub const MAX_TIMEOUT_SECS: u64 = 600;

    /// Load and validate a YAML configuration file.
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let version = value
            .get("version")
            .and_then(|v| v.as_u64())
            .ok_or(ConfigError::MissingVersion)?;

        if !SUPPORTED_VERSIONS.iter().any(|v| u64::from(*v) == version) {
            return Err(ConfigError::UnsupportedVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config: SyncConfig = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.delivery.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField("delivery.base_url".to_string()));
        }
        if self.delivery.project_id.trim().is_empty() {
            return Err(ConfigError::EmptyField("delivery.project_id".to_string()));
        }
        if self.delivery.depth > Self::MAX_DEPTH {
            return Err(ConfigError::range_with_hint(
                "delivery.depth",
                self.delivery.depth,
                0,
                Self::MAX_DEPTH,
                "Deeper subtrees rarely add searchable text.",
            ));
        }
        if !(1..=Self::MAX_TIMEOUT_SECS).contains(&self.delivery.timeout_secs) {
            return Err(ConfigError::range_with_hint(
                "delivery.timeout_secs",
                self.delivery.timeout_secs,
                1,
                Self::MAX_TIMEOUT_SECS,
                "",
            ));
        }
        if !(Self::MIN_WRITER_HEAP_BYTES..=Self::MAX_WRITER_HEAP_BYTES)
            .contains(&self.index.writer_heap_bytes)
        {
            return Err(ConfigError::range_with_hint(
                "index.writer_heap_bytes",
                self.index.writer_heap_bytes,
                Self::MIN_WRITER_HEAP_BYTES,
                Self::MAX_WRITER_HEAP_BYTES,
                "The index writer needs at least 15MB of arena.",
            ));
        }
        if self.cursor.partition_key.is_empty() {
            return Err(ConfigError::EmptyField("cursor.partition_key".to_string()));
        }
        if self.cursor.row_key.is_empty() {
            return Err(ConfigError::EmptyField("cursor.row_key".to_string()));
        }
        self.pass.validate()
    }
}

fn default_depth() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_writer_heap_bytes() -> usize {
    50_000_000
}

fn default_partition_key() -> String {
    "search-index".to_string()
}

fn default_row_key() -> String {
    "continuation-token".to_string()
}

fn default_slug_attribute() -> String {
    "url_slug".to_string()
}

fn default_resolve_concurrency() -> usize {
    8
}
