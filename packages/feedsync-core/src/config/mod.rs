//! Configuration
//!
//! A single YAML file (schema v1) describes one sync deployment:
//!
//! ```yaml
//! version: 1
//! delivery: { base_url: https://deliver.example.com, project_id: my-project }
//! index: { path: ./data/index }
//! cursor: { database_path: ./data/cursor.db }
//! pass: { slug_attribute: url_slug, resolve_concurrency: 8 }
//! ```

pub mod error;
pub mod sync_config;

pub use error::{ConfigError, ConfigResult};
pub use sync_config::{
    CursorConfig, DeliveryConfig, IndexConfig, PassConfig, ResolutionFailurePolicy,
    ResolutionStrategy, SyncConfig, SUPPORTED_VERSIONS,
};
