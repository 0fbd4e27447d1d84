//! Serializable pass results for the transport boundary (CLI / webhook caller)

use serde::{Deserialize, Serialize};

use super::reconciler::PassOutcome;
use crate::domain::{ObjectId, ObjectKey};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Bootstrapped,
    Synced,
    Failed,
}

/// Structured failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_ids: Vec<ObjectId>,
}

impl From<&SyncError> for ErrorReport {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            category: err.category().as_str().to_string(),
            message: err.to_string(),
            object_ids: err.affected_ids(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub status: PassStatus,
    #[serde(default)]
    pub removed: Vec<ObjectId>,
    #[serde(default)]
    pub indexed: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<ObjectKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_owners: Vec<ObjectKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl PassReport {
    pub fn from_result(result: &Result<PassOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(err) => Self::failed(err),
        }
    }

    pub fn failed(err: &SyncError) -> Self {
        Self {
            status: PassStatus::Failed,
            removed: Vec::new(),
            indexed: Vec::new(),
            skipped: Vec::new(),
            unresolved_owners: Vec::new(),
            cursor: None,
            duration_ms: 0,
            error: Some(ErrorReport::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != PassStatus::Failed
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&PassOutcome> for PassReport {
    fn from(outcome: &PassOutcome) -> Self {
        let status = if outcome.bootstrapped {
            PassStatus::Bootstrapped
        } else {
            PassStatus::Synced
        };
        Self {
            status,
            removed: outcome.removed.clone(),
            indexed: outcome.indexed.clone(),
            skipped: outcome.skipped.clone(),
            unresolved_owners: outcome.unresolved_owners.clone(),
            cursor: Some(outcome.cursor.to_string()),
            duration_ms: outcome.duration_ms,
            error: None,
        }
    }
}
