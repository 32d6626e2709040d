//! Versioned, path-keyed heap for the Lamina VM
//!
//! This crate implements the storage backend:
//! - Tree: a nested map addressed by `/`-delimited paths
//! - Heap: an ordered stack of trees with tombstoned deletion and
//!   checkpoint / revert / collapse semantics
//!
//! All live attribute data of every model instance resides here; instances
//! themselves are lightweight handles that own no data.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod heap;
pub mod tree;

pub use heap::Heap;
pub use tree::{Node, Tree};
