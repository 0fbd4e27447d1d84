//! Application layer: cursor lifecycle, per-pass working set and the reconciler.

pub mod cursor;
pub mod reconciler;
pub mod report;
pub mod working_set;

pub use cursor::CursorState;
pub use reconciler::{PassOutcome, Reconciler};
pub use report::{ErrorReport, PassReport, PassStatus};
pub use working_set::{ChangeSet, MutationPlan, PlanBuilder, RemoveReason, Resolution};
