//! Instruction and commit engine for the Lamina VM
//!
//! This crate hosts everything above the heap:
//! - Instruction kernel: opcode/mnemonic registry entries, argument kinds,
//!   mnemonic (wire) serialization, execution with lifecycle guarding
//! - Model metaschema: attribute descriptors, schema builder, identity
//!   allocation, instance handles, lifecycle states
//! - Constraint system: on-change validators attached to attributes
//! - Commit engine: hash-identified instruction groups, workspace protocol
//! - VM facade: registration, dispatch, transactions, heap access

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod commit;
pub mod config;
pub mod instruction;
pub mod model;
pub mod vm;

pub use commit::{Commit, CommitHash};
pub use config::VmConfig;
pub use instruction::{ArgKind, Handler, Instruction, InstructionDef, Operand};
pub use model::constraint::{Constraint, ConstraintCtx, ConstraintSet};
pub use model::descriptor::{AttrDescriptor, AttrKind};
pub use model::instance::{Kwargs, ModelInstance};
pub use model::lifecycle::Lifecycle;
pub use model::schema::{MemberInstruction, ModelSchema, ModelSchemaBuilder};
pub use vm::Vm;
