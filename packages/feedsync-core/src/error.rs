//! Error types for feedsync-core

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::ObjectId;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure reported by a collaborator (cursor store, feed, resolver, index).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PortError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::new(format!("JSON error: {}", err)).with_source(err)
    }
}

/// Which half of the apply step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStage {
    Remove,
    Upsert,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationStage::Remove => f.write_str("remove"),
            MutationStage::Upsert => f.write_str("upsert"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cursor unavailable: {0}")]
    CursorUnavailable(String),

    #[error("Cursor store error: {0}")]
    CursorStore(#[source] PortError),

    #[error("Cursor conflict: stored cursor moved away from {expected}")]
    CursorConflict { expected: String },

    #[error("Feed fetch failed: {0}")]
    FeedFetchFailed(#[source] PortError),

    #[error("Resolution failed for {codename}/{language} ({object_id}): {source}")]
    ResolutionFailed {
        object_id: ObjectId,
        codename: String,
        language: String,
        #[source]
        source: PortError,
    },

    #[error("Index mutation failed during {stage} of {} object(s): {source}", .object_ids.len())]
    IndexMutationFailed {
        stage: MutationStage,
        object_ids: Vec<ObjectId>,
        /// Removals already applied when an upsert failed
        removed_before_failure: Vec<ObjectId>,
        #[source]
        source: PortError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::CursorUnavailable(_) => ErrorKind::CursorUnavailable,
            SyncError::CursorStore(_) => ErrorKind::CursorStore,
            SyncError::CursorConflict { .. } => ErrorKind::CursorConflict,
            SyncError::FeedFetchFailed(_) => ErrorKind::FeedFetchFailed,
            SyncError::ResolutionFailed { .. } => ErrorKind::ResolutionFailed,
            SyncError::IndexMutationFailed { .. } => ErrorKind::IndexMutationFailed,
            SyncError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Config(_) => ErrorCategory::Permanent,
            SyncError::CursorStore(_) => ErrorCategory::Infrastructure,
            _ => ErrorCategory::Transient,
        }
    }

    /// Identities affected by the failure, for the transport's error payload.
    pub fn affected_ids(&self) -> Vec<ObjectId> {
        match self {
            SyncError::ResolutionFailed { object_id, .. } => vec![object_id.clone()],
            SyncError::IndexMutationFailed { object_ids, .. } => object_ids.clone(),
            _ => Vec::new(),
        }
    }
}

/// Stable machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CursorUnavailable,
    CursorStore,
    CursorConflict,
    FeedFetchFailed,
    ResolutionFailed,
    IndexMutationFailed,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CursorUnavailable => "cursor_unavailable",
            ErrorKind::CursorStore => "cursor_store",
            ErrorKind::CursorConflict => "cursor_conflict",
            ErrorKind::FeedFetchFailed => "feed_fetch_failed",
            ErrorKind::ResolutionFailed => "resolution_failed",
            ErrorKind::IndexMutationFailed => "index_mutation_failed",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error category for the external trigger's retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Transient error - re-invoke the pass (e.g., network, index busy)
    Transient,
    /// Permanent error - don't retry (e.g., invalid configuration)
    Permanent,
    /// Infrastructure error - alert ops (e.g., cursor database unreadable)
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
