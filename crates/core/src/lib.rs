//! Core types for the Lamina VM
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: unified enum for everything the heap can store
//! - FixedTuple: fixed-arity tuple with named accessors
//! - Address / Segment: path-keyed heap addressing
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod error;
pub mod tuple;
pub mod value;

pub use address::{Address, Segment};
pub use error::{Error, Result};
pub use tuple::FixedTuple;
pub use value::Value;
