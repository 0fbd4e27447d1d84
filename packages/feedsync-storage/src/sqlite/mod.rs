//! SQLite adapters

mod cursor_store;

pub use cursor_store::{CursorRow, SqliteCursorStore};
