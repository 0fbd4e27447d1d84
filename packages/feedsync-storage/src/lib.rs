//! feedsync-storage: durable cursor row for the sync engine
//!
//! The reconciler only needs one durable value, the last consumed
//! change-feed position. This package keeps it in a small SQLite table keyed
//! by `(partition_key, row_key)` and implements
//! [`feedsync_core::ports::CursorStore`] on top of it, including an atomic
//! compare-and-put.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feedsync_storage::SqliteCursorStore;
//!
//! let store = SqliteCursorStore::open("state/cursor.db", "search-index", "continuation-token")?;
//! let reconciler = Reconciler::new(Arc::new(store), feed, resolver, sink, config.pass)?;
//! reconciler.run_pass().await?;
//! ```

pub mod error;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{ErrorKind, Result, StorageError};

#[cfg(feature = "sqlite")]
pub use sqlite::{CursorRow, SqliteCursorStore};
