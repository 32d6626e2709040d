//! # Lamina
//!
//! A deterministic, transactional virtual machine for declarative data
//! models. Applications define entity schemas (models with typed attributes,
//! constraints, and custom instructions); the VM hosts instances of those
//! entities in a versioned heap, mutates them only via recorded instructions
//! grouped into commits, and supports rollback to any prior commit. Commits
//! form a hash-identified log suitable for replay, audit, and distribution.
//!
//! # Quick Start
//!
//! ```no_run
//! use lamina::{AttrDescriptor, ArgKind, Constraint, Kwargs, MemberInstruction,
//!              ModelSchema, Value, Vm};
//!
//! fn main() -> lamina::Result<()> {
//!     let mut vm = Vm::new();
//!
//!     // A model: typed attributes, a member instruction, a constraint.
//!     let counter = ModelSchema::builder("Counter")
//!         .attr(AttrDescriptor::int("value").default_value(0))
//!         .instruction(MemberInstruction::new(
//!             "add", 101, "CNT.ADD", vec![ArgKind::Int],
//!             |vm, this, args| {
//!                 let current = this.get(vm, "value")?.as_int().unwrap_or(0);
//!                 let delta = args[0].as_int().unwrap_or(0);
//!                 this.set(vm, "value", current + delta)
//!             },
//!         ))
//!         .constraint("value", Constraint::on_change("non_negative", &[], |ctx| {
//!             ctx.new.as_int().map(|n| n >= 0).unwrap_or(false)
//!         }))
//!         .build()?;
//!     vm.register_model(counter)?;
//!
//!     // Construction and mutation are recorded instructions.
//!     let c = vm.instantiate("Counter", Kwargs::new())?;
//!     vm.commit()?;
//!
//!     c.invoke(&vm, "add", vec![5.into()])?;
//!     vm.commit()?;
//!     assert_eq!(c.get(&vm, "value")?, Value::Int(5));
//!
//!     // Rollback undoes the last commit.
//!     vm.rollback()?;
//!     assert_eq!(c.get(&vm, "value")?, Value::Int(0));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Layer | Crate | Responsibility |
//! |-------|-------|----------------|
//! | Core types | `lamina-core` | values, tuples, addresses, errors |
//! | Heap | `lamina-heap` | path-keyed tree layers, checkpoint/revert/collapse |
//! | Engine | `lamina-engine` | instructions, models, constraints, commits, VM |
//!
//! Every state mutation is expressible as a mnemonic-form instruction (a
//! JSON array `[mnemonic, arg...]`), which is both the wire format and the
//! commit-hash input, so a remote facade can proxy the full VM surface by
//! shipping those forms.

pub use lamina_core::{Address, Error, FixedTuple, Result, Segment, Value};
pub use lamina_engine::{
    builtins, ArgKind, AttrDescriptor, AttrKind, Commit, CommitHash, Constraint, ConstraintCtx,
    ConstraintSet, Handler, Instruction, InstructionDef, Kwargs, Lifecycle, MemberInstruction,
    ModelInstance, ModelSchema, ModelSchemaBuilder, Operand, Vm, VmConfig,
};
pub use lamina_heap::{Heap, Node, Tree};
