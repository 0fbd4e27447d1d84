//! Common test utilities for feedsync-core
//!
//! Scripted collaborator doubles and content fixtures shared by the
//! integration tests.

#![allow(dead_code)]

mod doubles;
mod fixtures;

pub use doubles::*;
pub use fixtures::*;
