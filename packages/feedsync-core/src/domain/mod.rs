//! Domain layer: identity, feed/content models, indexability and projection.

pub mod document;
pub mod identity;
pub mod indexability;
pub mod models;

pub use document::{build_document, plain_text};
pub use identity::{object_id, ObjectId, ObjectKey};
pub use indexability::IndexabilityRule;
pub use models::{
    ChangeRecord, ChangeType, ContentBlock, ContentItem, Cursor, Element, ItemSystem,
    ResolvedSubtree, SearchableDocument,
};
