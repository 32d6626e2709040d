//! Model schemas
//!
//! A schema is the compiled, immutable form of a model declaration: its
//! descriptor table, its member instructions, and its identity-allocation
//! state. Schemas are built once during the registration phase and shared
//! as `Arc<ModelSchema>` thereafter.

use lamina_core::{Address, Error, Result, Value};
use lamina_heap::Heap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::instruction::{ArgKind, InstructionDef, Operand};
use crate::model::constraint::Constraint;
use crate::model::descriptor::AttrDescriptor;
use crate::model::instance::ModelInstance;
use crate::vm::Vm;

/// Body type for member instructions
///
/// The first parameter after the VM is the owning instance, already moved to
/// the user-changing lifecycle state; the slice holds the remaining operands.
pub type MemberBody =
    Arc<dyn Fn(&Vm, &ModelInstance, &[Operand]) -> Result<()> + Send + Sync>;

/// A member instruction declared on a model
///
/// Carries `(opcode, mnemonic, argument kinds)` metadata plus the body. The
/// owning instance is an implicit first argument and is not listed in
/// `args`.
pub struct MemberInstruction {
    name: String,
    opcode: u32,
    mnemonic: String,
    args: Vec<ArgKind>,
    body: MemberBody,
}

impl MemberInstruction {
    /// Declare a member instruction
    ///
    /// `name` is the invocation name on the instance
    /// ([`ModelInstance::invoke`]); `mnemonic` the canonical wire token.
    pub fn new<F>(name: &str, opcode: u32, mnemonic: &str, args: Vec<ArgKind>, body: F) -> Self
    where
        F: Fn(&Vm, &ModelInstance, &[Operand]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            opcode,
            mnemonic: mnemonic.to_string(),
            args,
            body: Arc::new(body),
        }
    }

    /// Invocation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opcode (must be > 100; validated at VM registration)
    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    /// Canonical mnemonic
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Declared argument kinds, excluding the implicit owner
    pub fn args(&self) -> &[ArgKind] {
        &self.args
    }

    /// Synthesize the registry entry for this member instruction
    ///
    /// Dispatch goes through the full operand list; position 0 is the owner
    /// instance.
    pub(crate) fn to_def(&self) -> InstructionDef {
        let body = self.body.clone();
        let mnemonic = self.mnemonic.clone();
        let mut kinds = vec![ArgKind::ModelInstance];
        kinds.extend(self.args.iter().cloned());
        InstructionDef::new(self.opcode, &self.mnemonic, kinds, move |vm, operands| {
            let this = operands[0].instance().ok_or_else(|| {
                Error::bad_call(mnemonic.clone(), "first argument must be a model instance")
            })?;
            body(vm, this, &operands[1..])
        })
    }
}

impl fmt::Debug for MemberInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInstruction")
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .field("mnemonic", &self.mnemonic)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Compiled model schema
///
/// Holds the descriptor table (with the injected `_id` descriptor), the
/// member instructions, and the per-model id-allocation lock. Ids are
/// positive, monotone, and never reused within a VM session.
#[derive(Debug)]
pub struct ModelSchema {
    name: String,
    attrs: BTreeMap<String, AttrDescriptor>,
    members: Vec<MemberInstruction>,
    id_lock: Mutex<()>,
}

impl ModelSchema {
    /// Start building a schema
    pub fn builder(name: &str) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.to_string(),
            attrs: Vec::new(),
            members: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a declared attribute
    pub fn attr(&self, name: &str) -> Result<&AttrDescriptor> {
        self.attrs
            .get(name)
            .ok_or_else(|| Error::unknown_attribute(&self.name, name))
    }

    /// Iterate over all descriptors, `_id` included
    pub fn attrs(&self) -> impl Iterator<Item = &AttrDescriptor> {
        self.attrs.values()
    }

    /// Names of all attributes, `_id` included
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    /// Look up a member instruction by invocation name
    pub fn member(&self, name: &str) -> Option<&MemberInstruction> {
        self.members.iter().find(|m| m.name == name)
    }

    /// All member instructions
    pub fn members(&self) -> &[MemberInstruction] {
        &self.members
    }

    /// Allocate the next instance id
    ///
    /// Atomic read-modify-write of `<model>/IDCOUNTER` under the per-model
    /// lock; the first issued id is 1.
    pub(crate) fn next_id(&self, heap: &Heap) -> i64 {
        let _guard = self.id_lock.lock();
        let counter = Address::id_counter(&self.name);
        let current = heap.get(counter.clone()).and_then(|v| v.as_int()).unwrap_or(0);
        let next = current + 1;
        heap.set(counter, next);
        next
    }

    /// Portable attribute snapshot for an instance
    ///
    /// The map carried by `INST` instructions: `_id` appears as `id`,
    /// foreign attributes as `<name>_id`, tuples flattened to lists.
    pub(crate) fn snapshot(&self, heap: &Heap, id: i64) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for desc in self.attrs.values() {
            if desc.name() == "_id" {
                map.insert("id".to_string(), Value::Int(id));
            } else if desc.is_foreign() {
                let stored = desc.read(heap, id).unwrap_or(Value::Null);
                map.insert(format!("{}_id", desc.name()), stored);
            } else {
                let stored = desc.read(heap, id).unwrap_or(Value::Null);
                map.insert(desc.name().to_string(), stored);
            }
        }
        map
    }
}

/// Builder for [`ModelSchema`]
///
/// The registration-phase schema compiler: collects descriptors, member
/// instructions, and constraints, validates the declaration, and returns the
/// immutable schema.
pub struct ModelSchemaBuilder {
    name: String,
    attrs: Vec<AttrDescriptor>,
    members: Vec<MemberInstruction>,
    constraints: Vec<(String, Constraint)>,
}

impl ModelSchemaBuilder {
    /// Declare an attribute
    pub fn attr(mut self, descriptor: AttrDescriptor) -> Self {
        self.attrs.push(descriptor);
        self
    }

    /// Declare a member instruction
    pub fn instruction(mut self, member: MemberInstruction) -> Self {
        self.members.push(member);
        self
    }

    /// Attach an on-change constraint to `target`
    pub fn constraint(mut self, target: &str, constraint: Constraint) -> Self {
        self.constraints.push((target.to_string(), constraint));
        self
    }

    /// Validate the declaration and compile the schema
    ///
    /// # Errors
    ///
    /// Configuration errors: a user-declared `id`/`_id` attribute, duplicate
    /// attribute or member names, a default that does not match its kind, or
    /// a constraint naming an undeclared attribute.
    pub fn build(self) -> Result<ModelSchema> {
        let mut attrs: BTreeMap<String, AttrDescriptor> = BTreeMap::new();
        for mut desc in self.attrs {
            if desc.name() == "id" || desc.name() == "_id" {
                return Err(Error::invalid_model(
                    &self.name,
                    "manual definition of id is not allowed",
                ));
            }
            desc.set_model(&self.name);
            desc.validate_default()?;
            let name = desc.name().to_string();
            if attrs.insert(name.clone(), desc).is_some() {
                return Err(Error::invalid_model(
                    &self.name,
                    format!("duplicate attribute '{}'", name),
                ));
            }
        }

        let mut id = AttrDescriptor::int("_id");
        id.set_model(&self.name);
        attrs.insert("_id".to_string(), id);

        for (target, constraint) in self.constraints {
            for related in constraint.related() {
                if !attrs.contains_key(related) {
                    return Err(Error::invalid_model(
                        &self.name,
                        format!(
                            "constraint '{}' relates to undeclared attribute '{}'",
                            constraint.name(),
                            related
                        ),
                    ));
                }
            }
            let desc = attrs.get_mut(&target).ok_or_else(|| {
                Error::invalid_model(
                    &self.name,
                    format!(
                        "constraint '{}' targets undeclared attribute '{}'",
                        constraint.name(),
                        target
                    ),
                )
            })?;
            desc.constraints_mut().add(constraint.attach(&target));
        }

        let mut seen = std::collections::BTreeSet::new();
        for member in &self.members {
            if !seen.insert(member.name().to_string()) {
                return Err(Error::invalid_model(
                    &self.name,
                    format!("duplicate member instruction '{}'", member.name()),
                ));
            }
        }

        Ok(ModelSchema {
            name: self.name,
            attrs,
            members: self.members,
            id_lock: Mutex::new(()),
        })
    }
}
