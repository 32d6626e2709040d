//! Instruction kernel
//!
//! An [`InstructionDef`] is a registry entry: opcode, mnemonic, argument
//! kinds, and handler. An [`Instruction`] is a value: a definition bound to
//! concrete operands, validated at construction. Instructions serialize to
//! the mnemonic form, a JSON array `[mnemonic, arg...]`, which is both the
//! wire format and the commit-hash input.
//!
//! Executing an instruction moves every model-instance operand into the
//! user-changing lifecycle state, runs the handler, and restores the normal
//! state on every exit path.

use lamina_core::{Error, Result, Value};
use std::fmt;
use std::sync::Arc;

use crate::model::instance::ModelInstance;
use crate::vm::Vm;

/// Expected kind of one instruction argument
///
/// The sum-type matcher over operand shapes; class and instance references
/// are first-class kinds alongside scalars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    /// Integer scalar
    Int,
    /// Float scalar
    Float,
    /// Boolean scalar
    Bool,
    /// String scalar
    Str,
    /// List of any length
    List,
    /// List of exactly this length
    Tuple(usize),
    /// String-keyed map
    Map,
    /// A registered model class
    ModelClass,
    /// A model instance reference
    ModelInstance,
    /// Anything
    Any,
}

impl ArgKind {
    /// Check an operand against this kind
    pub fn matches(&self, operand: &Operand) -> bool {
        match (self, operand) {
            (ArgKind::Any, _) => true,
            (ArgKind::ModelClass, Operand::Class(_)) => true,
            (ArgKind::ModelInstance, Operand::Instance(_)) => true,
            (ArgKind::Int, Operand::Value(Value::Int(_))) => true,
            (ArgKind::Float, Operand::Value(Value::Float(_))) => true,
            (ArgKind::Bool, Operand::Value(Value::Bool(_))) => true,
            (ArgKind::Str, Operand::Value(Value::String(_))) => true,
            (ArgKind::List, Operand::Value(Value::List(_))) => true,
            (ArgKind::Tuple(arity), Operand::Value(Value::List(items))) => items.len() == *arity,
            (ArgKind::Map, Operand::Value(Value::Map(_))) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Int => write!(f, "int"),
            ArgKind::Float => write!(f, "float"),
            ArgKind::Bool => write!(f, "bool"),
            ArgKind::Str => write!(f, "str"),
            ArgKind::List => write!(f, "list"),
            ArgKind::Tuple(n) => write!(f, "tuple[{}]", n),
            ArgKind::Map => write!(f, "map"),
            ArgKind::ModelClass => write!(f, "model class"),
            ArgKind::ModelInstance => write!(f, "model instance"),
            ArgKind::Any => write!(f, "any"),
        }
    }
}

/// One bound argument of an instruction value
#[derive(Debug, Clone)]
pub enum Operand {
    /// A plain value
    Value(Value),
    /// A model class reference, by name
    Class(String),
    /// A model instance reference
    Instance(ModelInstance),
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Value(a), Operand::Value(b)) => a == b,
            (Operand::Class(a), Operand::Class(b)) => a == b,
            (Operand::Instance(a), Operand::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl Operand {
    /// The plain value, if this is a `Value` operand
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer value operand
    pub fn as_int(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_int)
    }

    /// The string payload, if this is a string value operand
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// The class name, if this is a class operand
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Operand::Class(name) => Some(name),
            _ => None,
        }
    }

    /// The instance handle, if this is an instance operand
    pub fn instance(&self) -> Option<&ModelInstance> {
        match self {
            Operand::Instance(handle) => Some(handle),
            _ => None,
        }
    }

    /// Encode to the mnemonic argument form
    ///
    /// Classes encode as `["DatamodelMeta", name]`, instances as
    /// `[model, id]`, values as their JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Operand::Value(v) => v.to_json(),
            Operand::Class(name) => Ok(serde_json::json!([CLASS_TOKEN, name])),
            Operand::Instance(handle) => {
                Ok(serde_json::json!([handle.model(), handle.id()]))
            }
        }
    }

    /// Decode from the mnemonic argument form
    ///
    /// A two-element array headed by the class token resolves to a class
    /// operand; one headed by a registered model name resolves to an
    /// instance reference via `get_by_id`. Anything else is a plain value.
    pub fn from_json(vm: &Vm, json: &serde_json::Value) -> Result<Operand> {
        if let Some(items) = json.as_array() {
            if items.len() == 2 {
                if let (Some(head), tail) = (items[0].as_str(), &items[1]) {
                    if head == CLASS_TOKEN {
                        let name = tail.as_str().ok_or_else(|| {
                            Error::serialization("class token must name a model")
                        })?;
                        if vm.model(name).is_err() {
                            return Err(Error::serialization(format!(
                                "unknown model '{}' in mnemonic form",
                                name
                            )));
                        }
                        return Ok(Operand::Class(name.to_string()));
                    }
                    if vm.model(head).is_ok() {
                        if let Some(id) = tail.as_i64() {
                            return Ok(Operand::Instance(vm.get_by_id(head, id)?));
                        }
                    }
                }
            }
        }
        Ok(Operand::Value(Value::from_json(json)?))
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Value(Value::Int(n))
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Value(Value::Int(n as i64))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<&ModelInstance> for Operand {
    fn from(handle: &ModelInstance) -> Self {
        Operand::Instance(handle.clone())
    }
}

/// Marker token for model-class arguments in mnemonic forms
pub const CLASS_TOKEN: &str = "DatamodelMeta";

/// Handler invoked when an instruction executes
#[derive(Clone)]
pub enum Handler {
    /// Side-effect-free marker (transaction delimiters, `INST`)
    Marker,
    /// A body run against the VM
    Body(InstructionBody),
}

/// Body type for instruction handlers
pub type InstructionBody = Arc<dyn Fn(&Vm, &[Operand]) -> Result<()> + Send + Sync>;

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Marker => write!(f, "Marker"),
            Handler::Body(_) => write!(f, "Body(..)"),
        }
    }
}

/// An instruction class: opcode, mnemonic, argument kinds, and handler
///
/// Arity is implied by the argument-kind list, so an arity/kinds mismatch is
/// unrepresentable. Reserved opcodes `1..=100` belong to the built-ins;
/// registration validates that user definitions stay above the range.
#[derive(Debug)]
pub struct InstructionDef {
    opcode: u32,
    mnemonic: String,
    args: Vec<ArgKind>,
    handler: Handler,
}

impl InstructionDef {
    /// Define an instruction with a body
    pub fn new<F>(opcode: u32, mnemonic: &str, args: Vec<ArgKind>, body: F) -> Self
    where
        F: Fn(&Vm, &[Operand]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            opcode,
            mnemonic: mnemonic.to_string(),
            args,
            handler: Handler::Body(Arc::new(body)),
        }
    }

    /// Define a side-effect-free marker instruction
    pub fn marker(opcode: u32, mnemonic: &str, args: Vec<ArgKind>) -> Self {
        Self {
            opcode,
            mnemonic: mnemonic.to_string(),
            args,
            handler: Handler::Marker,
        }
    }

    /// Opcode
    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    /// Mnemonic
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Declared argument kinds
    pub fn args(&self) -> &[ArgKind] {
        &self.args
    }

    /// Number of arguments
    pub fn n_args(&self) -> usize {
        self.args.len()
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Display for InstructionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} opcode={} n_args={}>",
            self.mnemonic,
            self.opcode,
            self.args.len()
        )
    }
}

/// An instruction value: a definition bound to concrete operands
///
/// Construction validates arity and per-position argument kinds; execution
/// and logging always see well-formed instructions.
#[derive(Debug, Clone)]
pub struct Instruction {
    def: Arc<InstructionDef>,
    args: Vec<Operand>,
}

impl Instruction {
    /// Bind operands to a definition
    ///
    /// # Errors
    ///
    /// `BadInstructionCall` on wrong arity or a kind mismatch at any
    /// position.
    pub fn new(def: Arc<InstructionDef>, args: Vec<Operand>) -> Result<Instruction> {
        if args.len() != def.n_args() {
            return Err(Error::bad_call(
                def.mnemonic(),
                format!("expected {} arguments, got {}", def.n_args(), args.len()),
            ));
        }
        for (position, (kind, operand)) in def.args().iter().zip(&args).enumerate() {
            if !kind.matches(operand) {
                return Err(Error::bad_call(
                    def.mnemonic(),
                    format!("argument {} must be {}", position, kind),
                ));
            }
        }
        Ok(Instruction { def, args })
    }

    /// The definition this value is bound to
    pub fn def(&self) -> &Arc<InstructionDef> {
        &self.def
    }

    /// Mnemonic of the definition
    pub fn mnemonic(&self) -> &str {
        self.def.mnemonic()
    }

    /// Opcode of the definition
    pub fn opcode(&self) -> u32 {
        self.def.opcode()
    }

    /// Bound operands
    pub fn args(&self) -> &[Operand] {
        &self.args
    }

    /// Encode to the canonical mnemonic form: `[mnemonic, arg...]`
    pub fn mnemonize(&self) -> Result<serde_json::Value> {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(serde_json::Value::String(self.def.mnemonic().to_string()));
        for operand in &self.args {
            parts.push(operand.to_json()?);
        }
        Ok(serde_json::Value::Array(parts))
    }

    /// Encode to the mnemonic form as a JSON string
    pub fn mnemonize_string(&self) -> Result<String> {
        serde_json::to_string(&self.mnemonize()?).map_err(Error::from)
    }

    /// Decode a mnemonic form against the VM's registry
    ///
    /// # Errors
    ///
    /// `Serialization` for a non-array form, an unknown mnemonic, or a
    /// length that does not match the definition's arity.
    pub fn load(vm: &Vm, form: &serde_json::Value) -> Result<Instruction> {
        let parts = form
            .as_array()
            .ok_or_else(|| Error::serialization("mnemonic form must be an array"))?;
        let mnemonic = parts
            .first()
            .and_then(|p| p.as_str())
            .ok_or_else(|| Error::serialization("mnemonic form must start with a mnemonic"))?;
        let def = vm
            .instruction(mnemonic)
            .map_err(|_| Error::serialization(format!("unknown mnemonic '{}'", mnemonic)))?;
        if parts.len() != def.n_args() + 1 {
            return Err(Error::serialization(format!(
                "cannot load mnemonic form for '{}': expected {} arguments, got {}",
                mnemonic,
                def.n_args(),
                parts.len() - 1
            )));
        }
        let args = parts[1..]
            .iter()
            .map(|p| Operand::from_json(vm, p))
            .collect::<Result<Vec<_>>>()?;
        Instruction::new(def, args)
    }

    /// Parse and decode a mnemonic form from its string encoding
    pub fn load_str(vm: &Vm, text: &str) -> Result<Instruction> {
        let form: serde_json::Value = serde_json::from_str(text)?;
        Self::load(vm, &form)
    }

    /// Execute against the VM
    ///
    /// Model-instance operands transition to the user-changing state for the
    /// duration of the handler and return to normal on every exit path.
    pub(crate) fn run(&self, vm: &Vm) -> Result<()> {
        let _guard = LifecycleGuard::enter(&self.args);
        match self.def.handler() {
            Handler::Marker => Ok(()),
            Handler::Body(body) => body(vm, &self.args),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} opcode={} n_args={}>",
            self.def.mnemonic(),
            self.def.opcode(),
            self.args.len()
        )
    }
}

/// Restores model operands to the normal state on drop, covering both the
/// success and error paths of a handler.
struct LifecycleGuard<'a> {
    models: Vec<&'a ModelInstance>,
}

impl<'a> LifecycleGuard<'a> {
    fn enter(args: &'a [Operand]) -> Self {
        let models: Vec<&ModelInstance> = args.iter().filter_map(Operand::instance).collect();
        for model in &models {
            model.begin_user_change();
        }
        Self { models }
    }
}

impl Drop for LifecycleGuard<'_> {
    fn drop(&mut self) {
        for model in &self.models {
            model.to_normal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lifecycle::Lifecycle;

    fn nop() -> Arc<InstructionDef> {
        Arc::new(InstructionDef::new(
            200,
            "TEST.NOP",
            vec![ArgKind::Int, ArgKind::Str],
            |_, _| Ok(()),
        ))
    }

    #[test]
    fn test_argkind_matching() {
        assert!(ArgKind::Int.matches(&Operand::from(1)));
        assert!(!ArgKind::Int.matches(&Operand::from("x")));
        assert!(ArgKind::Str.matches(&Operand::from("x")));
        assert!(ArgKind::Any.matches(&Operand::from("x")));
        assert!(ArgKind::Tuple(2).matches(&Operand::Value(Value::from((1, 2)))));
        assert!(!ArgKind::Tuple(3).matches(&Operand::Value(Value::from((1, 2)))));
        assert!(ArgKind::ModelClass.matches(&Operand::Class("Infantry".into())));
        assert!(!ArgKind::ModelClass.matches(&Operand::from(1)));
        let handle = ModelInstance::new("Infantry", 1, Lifecycle::Normal);
        assert!(ArgKind::ModelInstance.matches(&Operand::Instance(handle)));
    }

    #[test]
    fn test_construction_validates_arity() {
        let err = Instruction::new(nop(), vec![Operand::from(1)]).unwrap_err();
        assert!(err.is_call_site());
        assert!(err.to_string().contains("expected 2 arguments"));
    }

    #[test]
    fn test_construction_validates_kinds() {
        let err =
            Instruction::new(nop(), vec![Operand::from("x"), Operand::from("y")]).unwrap_err();
        assert!(err.to_string().contains("argument 0 must be int"));
    }

    #[test]
    fn test_construction_accepts_valid_args() {
        let instruction =
            Instruction::new(nop(), vec![Operand::from(1), Operand::from("y")]).unwrap();
        assert_eq!(instruction.mnemonic(), "TEST.NOP");
        assert_eq!(instruction.opcode(), 200);
        assert_eq!(instruction.args().len(), 2);
    }

    #[test]
    fn test_mnemonize_scalars() {
        let instruction =
            Instruction::new(nop(), vec![Operand::from(7), Operand::from("hi")]).unwrap();
        let form = instruction.mnemonize().unwrap();
        assert_eq!(form, serde_json::json!(["TEST.NOP", 7, "hi"]));
    }

    #[test]
    fn test_mnemonize_class_and_instance() {
        let def = Arc::new(InstructionDef::marker(
            201,
            "TEST.REFS",
            vec![ArgKind::ModelClass, ArgKind::ModelInstance],
        ));
        let handle = ModelInstance::new("Infantry", 3, Lifecycle::Normal);
        let instruction = Instruction::new(
            def,
            vec![Operand::Class("Infantry".into()), Operand::Instance(handle)],
        )
        .unwrap();
        let form = instruction.mnemonize().unwrap();
        assert_eq!(
            form,
            serde_json::json!(["TEST.REFS", ["DatamodelMeta", "Infantry"], ["Infantry", 3]])
        );
    }

    #[test]
    fn test_display() {
        let def = nop();
        assert_eq!(def.to_string(), "<TEST.NOP opcode=200 n_args=2>");
    }
}
