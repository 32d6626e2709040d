//! Model instance handles
//!
//! An instance is a lightweight handle `(model, id, lifecycle)` owning no
//! attribute data; everything lives in the heap, which keeps versioning
//! trivial and makes handles freely re-materializable via
//! [`crate::Vm::get_by_id`]. All attribute access routes through the
//! lifecycle gate.

use lamina_core::{Error, FixedTuple, Result, Value};
use std::cell::Cell;
use std::collections::BTreeMap;

use crate::instruction::{Instruction, Operand};
use crate::model::constraint::ConstraintCtx;
use crate::model::descriptor::AttrDescriptor;
use crate::model::lifecycle::Lifecycle;
use crate::model::schema::ModelSchema;
use crate::{builtins, vm::Vm};

/// Handle to a model instance
///
/// Cloning a handle copies its current lifecycle state; a destroyed handle
/// stays destroyed, but fresh `Normal` handles for the same instance can be
/// materialized through `get_by_id` at any time.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    model: String,
    id: i64,
    state: Cell<Lifecycle>,
}

impl PartialEq for ModelInstance {
    /// Identity comparison: same model and id, lifecycle ignored
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.id == other.id
    }
}

impl ModelInstance {
    pub(crate) fn new(model: &str, id: i64, state: Lifecycle) -> Self {
        Self {
            model: model.to_string(),
            id,
            state: Cell::new(state),
        }
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Instance id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> Lifecycle {
        self.state.get()
    }

    /// Check whether this handle has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.state.get() == Lifecycle::Destroyed
    }

    pub(crate) fn set_state(&self, state: Lifecycle) {
        self.state.set(state);
    }

    pub(crate) fn begin_user_change(&self) {
        self.state.set(Lifecycle::UserChanging);
    }

    pub(crate) fn to_normal(&self) {
        self.state.set(Lifecycle::Normal);
    }

    /// Read an attribute
    ///
    /// Foreign attributes read as their stored referent id; use
    /// [`get_ref`](Self::get_ref) for a handle. Unset attributes read as
    /// `Null`.
    pub fn get(&self, vm: &Vm, attr: &str) -> Result<Value> {
        if self.is_destroyed() {
            return Err(Error::destroyed(&self.model, self.id));
        }
        let schema = vm.model(&self.model)?;
        let desc = schema.attr(attr)?;
        Ok(desc.read(vm.heap(), self.id).unwrap_or(Value::Null))
    }

    /// Read a tuple attribute as a [`FixedTuple`]
    pub fn get_tuple(&self, vm: &Vm, attr: &str) -> Result<FixedTuple> {
        let schema = vm.model(&self.model)?;
        let desc = schema.attr(attr)?;
        let arity = match desc.kind() {
            crate::model::descriptor::AttrKind::Tuple(n) => *n,
            _ => {
                return Err(Error::bad_call(
                    format!("{}.{}", self.model, attr),
                    "attribute is not a tuple",
                ))
            }
        };
        let value = self.get(vm, attr)?;
        FixedTuple::from_value(arity, &value).ok_or_else(|| {
            Error::bad_call(
                format!("{}.{}", self.model, attr),
                format!("stored value {} is not a tuple", value),
            )
        })
    }

    /// Read a foreign attribute as an instance handle
    ///
    /// Reads the stored id and materializes a `Normal` handle lazily.
    pub fn get_ref(&self, vm: &Vm, attr: &str) -> Result<ModelInstance> {
        let schema = vm.model(&self.model)?;
        let desc = schema.attr(attr)?;
        let target = desc.foreign_model().ok_or_else(|| {
            Error::bad_call(
                format!("{}.{}", self.model, attr),
                "attribute is not a foreign reference",
            )
        })?;
        let id = self.get(vm, attr)?.as_int().ok_or_else(|| {
            Error::bad_call(
                format!("{}.{}", self.model, attr),
                "foreign reference is unset",
            )
        })?;
        vm.get_by_id(target, id)
    }

    /// Write an attribute, gated by the lifecycle state
    ///
    /// - `Normal`: fails; instances are immutable from outside
    /// - `UserChanging`: coerce, validate constraints, write
    /// - `EngineChanging`: coerce and write, bypassing constraints
    /// - `Destroyed`: fails
    pub fn set(&self, vm: &Vm, attr: &str, value: impl Into<Value>) -> Result<()> {
        let schema = vm.model(&self.model)?;
        let desc = schema.attr(attr)?;
        if attr == "_id" {
            return Err(Error::read_only(&self.model, attr));
        }
        let value = desc.coerce(value.into());
        match self.state.get() {
            Lifecycle::Destroyed => Err(Error::destroyed(&self.model, self.id)),
            Lifecycle::Normal => Err(Error::read_only(&self.model, attr)),
            Lifecycle::UserChanging => {
                self.validate_constraints(vm, &schema, desc, &value)?;
                desc.write(vm.heap(), self.id, value);
                Ok(())
            }
            Lifecycle::EngineChanging => {
                desc.write(vm.heap(), self.id, value);
                Ok(())
            }
        }
    }

    /// Invoke a member instruction by name
    ///
    /// Builds the instruction value, serializes it to mnemonic form, and
    /// hands the form to the VM for execution. The round-trip through the
    /// mnemonic form keeps local and remote invocation identical.
    pub fn invoke(&self, vm: &Vm, name: &str, args: Vec<Operand>) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::destroyed(&self.model, self.id));
        }
        let schema = vm.model(&self.model)?;
        let member = schema.member(name).ok_or_else(|| {
            Error::unknown_instruction(format!("{}.{}", self.model, name))
        })?;
        let def = vm.instruction(member.mnemonic())?;
        let mut operands = vec![Operand::Instance(self.clone())];
        operands.extend(args);
        let instruction = Instruction::new(def, operands)?;
        let form = instruction.mnemonize()?;
        vm.execute_from_mnemonic(&[form])
    }

    /// Destroy this instance
    ///
    /// Records a `DESTROY` instruction (which deletes every attribute path,
    /// `_id` included; the model's `IDCOUNTER` survives) and marks this
    /// handle `Destroyed`.
    pub fn destroy(&self, vm: &Vm) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::destroyed(&self.model, self.id));
        }
        let def = vm.instruction_by_opcode(builtins::DESTROY_OPCODE)?;
        let instruction = Instruction::new(
            def,
            vec![
                Operand::Class(self.model.clone()),
                Operand::Value(Value::Int(self.id)),
            ],
        )?;
        vm.execute(vec![instruction])?;
        self.set_state(Lifecycle::Destroyed);
        Ok(())
    }

    fn validate_constraints(
        &self,
        vm: &Vm,
        schema: &ModelSchema,
        desc: &AttrDescriptor,
        new: &Value,
    ) -> Result<()> {
        if desc.constraints().is_empty() {
            return Ok(());
        }
        let old = desc.read(vm.heap(), self.id).unwrap_or(Value::Null);
        for constraint in desc.constraints().iter() {
            let mut related = BTreeMap::new();
            for name in constraint.related() {
                let rd = schema.attr(name)?;
                let operand = match rd.foreign_model() {
                    Some(target) => match rd.read(vm.heap(), self.id).and_then(|v| v.as_int()) {
                        Some(fid) => Operand::Instance(vm.get_by_id(target, fid)?),
                        None => Operand::Value(Value::Null),
                    },
                    None => Operand::Value(rd.read(vm.heap(), self.id).unwrap_or(Value::Null)),
                };
                related.insert(name.clone(), operand);
            }
            let ctx = ConstraintCtx::new(vm, self, old.clone(), new.clone(), related);
            if !constraint.check(&ctx) {
                return Err(Error::constraint_violation(
                    constraint.name(),
                    constraint.attribute(),
                ));
            }
        }
        Ok(())
    }
}

/// Named constructor arguments for [`crate::Vm::instantiate`]
///
/// ```
/// use lamina_engine::Kwargs;
///
/// let kwargs = Kwargs::new().set("width", 20).set("height", 20);
/// assert!(kwargs.get("width").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Kwargs {
    entries: BTreeMap<String, Value>,
}

impl Kwargs {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide a value for an attribute
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.entries.insert(name.to_string(), value.into());
        self
    }

    /// Provide a referent for a foreign attribute
    pub fn set_ref(mut self, name: &str, instance: &ModelInstance) -> Self {
        self.entries
            .insert(name.to_string(), Value::Int(instance.id()));
        self
    }

    /// Look up a provided value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }
}
