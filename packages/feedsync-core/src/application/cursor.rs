//! Cursor lifecycle
//!
//! ```text
//! NoCursor ──bootstrap──▶ Bootstrap(c) ──persist──▶ (next pass) Stored(c)
//! ```
//!
//! A store read failure is an error and never collapses into `NoCursor`:
//! only a successful read that finds no row starts the bootstrap branch.

use tracing::info;

use crate::domain::Cursor;
use crate::error::{Result, SyncError};
use crate::ports::{ChangeFeedSource, CursorStore, FeedRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Store read succeeded and holds no cursor
    NoCursor,
    /// Starting position obtained from the feed, not yet consumed
    Bootstrap(Cursor),
    /// Position persisted by an earlier pass
    Stored(Cursor),
}

impl CursorState {
    pub async fn load(store: &dyn CursorStore) -> Result<Self> {
        match store.get().await.map_err(SyncError::CursorStore)? {
            Some(cursor) => Ok(CursorState::Stored(cursor)),
            None => Ok(CursorState::NoCursor),
        }
    }

    /// `NoCursor → Bootstrap`; other states are returned unchanged.
    pub async fn bootstrap(self, feed: &dyn ChangeFeedSource) -> Result<Self> {
        match self {
            CursorState::NoCursor => {
                let batch = feed.fetch(&FeedRequest::Bootstrap).await.map_err(|e| {
                    SyncError::CursorUnavailable(format!(
                        "no stored cursor and bootstrap read failed: {}",
                        e
                    ))
                })?;
                if batch.next_cursor.as_str().is_empty() {
                    return Err(SyncError::CursorUnavailable(
                        "no stored cursor and the feed returned no bootstrap cursor".to_string(),
                    ));
                }
                info!("Bootstrapped change feed cursor {}", batch.next_cursor);
                Ok(CursorState::Bootstrap(batch.next_cursor))
            }
            other => Ok(other),
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            CursorState::NoCursor => None,
            CursorState::Bootstrap(cursor) | CursorState::Stored(cursor) => Some(cursor),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            CursorState::NoCursor => "no_cursor",
            CursorState::Bootstrap(_) => "bootstrap",
            CursorState::Stored(_) => "stored",
        }
    }
}
