//! Adapters for the collaborator ports
//!
//! - `memory`: HashMap/slot-backed doubles (always available)
//! - `tantivy_index`: local Tantivy search index (feature `tantivy-index`)
//! - `delivery`: HTTP change feed + content resolver (feature `delivery`)

pub mod memory;

#[cfg(feature = "tantivy-index")]
pub mod index_schema;
#[cfg(feature = "tantivy-index")]
pub mod tantivy_index;

#[cfg(feature = "delivery")]
pub mod delivery;

pub use memory::{InMemoryCursorStore, InMemoryIndex};

#[cfg(feature = "tantivy-index")]
pub use tantivy_index::{SearchHit, TantivyIndexSink};

#[cfg(feature = "delivery")]
pub use delivery::DeliveryClient;
