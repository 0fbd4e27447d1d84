/*
 * feedsync-core - Incremental search-index synchronization
 *
 * Consumes a cursor-based content change feed and keeps a search index in
 * step with the content repository.
 *
 * Architecture:
 * - Domain: ObjectId identity, feed/content models, indexability, projection
 * - Ports: CursorStore / ChangeFeedSource / ContentResolver / IndexSink
 * - Application: cursor state machine, per-pass ChangeSet, Reconciler
 * - Infrastructure: in-memory, Tantivy and HTTP delivery adapters
 */

// Public modules
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

// Re-exports
pub use application::{
    ChangeSet, CursorState, ErrorReport, MutationPlan, PassOutcome, PassReport, PassStatus,
    Reconciler,
};
pub use config::{
    ConfigError, PassConfig, ResolutionFailurePolicy, ResolutionStrategy, SyncConfig,
};
pub use domain::{
    object_id, ChangeRecord, ChangeType, ContentBlock, ContentItem, Cursor, IndexabilityRule,
    ObjectId, ObjectKey, ResolvedSubtree, SearchableDocument,
};
pub use error::{ErrorCategory, ErrorKind, MutationStage, PortError, Result, SyncError};
pub use ports::{
    ChangeFeedSource, ContentResolver, CursorStore, FeedBatch, FeedRequest, IndexSink, PortResult,
};
