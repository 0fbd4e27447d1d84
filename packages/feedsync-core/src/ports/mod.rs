//! Collaborator ports (trait interfaces)
//!
//! The reconciler only talks to the outside world through these traits:
//! - `CursorStore`: durable single-row feed position
//! - `ChangeFeedSource`: cursor-addressed batches of change records
//! - `ContentResolver`: current state of one `(codename, language)`
//! - `IndexSink`: search-index mutation and facet lookup
//!
//! Adapters live in `crate::infrastructure` (in-memory, Tantivy, HTTP) and in
//! the `feedsync-storage` package (SQLite cursor row).

use async_trait::async_trait;

use crate::domain::{ChangeRecord, Cursor, ObjectId, ResolvedSubtree, SearchableDocument};
use crate::error::PortError;

pub type PortResult<T> = std::result::Result<T, PortError>;

/// Durable store of the last consumed feed position.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Stored cursor, or `None` when nothing was ever persisted.
    ///
    /// A read failure is an `Err`, never `Ok(None)`.
    async fn get(&self) -> PortResult<Option<Cursor>>;

    /// Unconditionally replace the stored cursor.
    async fn put(&self, cursor: &Cursor) -> PortResult<()>;

    /// Replace the stored cursor only if it still equals `expected`
    /// (`None` = row must be absent). Returns `false` when another writer
    /// moved it.
    ///
    /// The default is a non-atomic read-then-write; durable stores should
    /// override it with a single conditional update.
    async fn compare_and_put(&self, expected: Option<&Cursor>, next: &Cursor) -> PortResult<bool> {
        let current = self.get().await?;
        if current.as_ref() != expected {
            return Ok(false);
        }
        self.put(next).await?;
        Ok(true)
    }
}

/// Where to read the feed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    /// Fresh read with no continuation: yields only a starting cursor
    Bootstrap,
    /// Continue after a stored cursor
    Continue(Cursor),
}

/// One bounded batch of the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedBatch {
    pub records: Vec<ChangeRecord>,
    pub next_cursor: Cursor,
}

#[async_trait]
pub trait ChangeFeedSource: Send + Sync {
    async fn fetch(&self, request: &FeedRequest) -> PortResult<FeedBatch>;
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Current root item and its transcluded subtree, or `None` when the
    /// object no longer exists upstream.
    async fn resolve(&self, codename: &str, language: &str) -> PortResult<Option<ResolvedSubtree>>;
}

/// Search-index mutation keyed by [`ObjectId`].
///
/// Both mutations must be idempotent: re-removing an absent identity or
/// re-upserting identical content is a no-op.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Write documents; returns the identities actually written.
    async fn upsert_many(&self, documents: &[SearchableDocument]) -> PortResult<Vec<ObjectId>>;

    /// Delete identities; returns those that were present and removed.
    async fn remove_many(&self, object_ids: &[ObjectId]) -> PortResult<Vec<ObjectId>>;

    /// Indexed documents whose content blocks include `codename` in `language`.
    async fn find_by_codename_and_language(
        &self,
        codename: &str,
        language: &str,
    ) -> PortResult<Vec<SearchableDocument>>;
}
