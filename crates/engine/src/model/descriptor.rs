//! Attribute descriptors
//!
//! A descriptor carries everything the engine needs to know about one field
//! of a model: its declared kind, nullability, default, coercion, and the
//! constraints attached to on-change events. All attribute data lives in the
//! heap under `<model>/O/<id>/<attr>`; the descriptor is the only gateway to
//! those paths.

use lamina_core::{Address, Error, FixedTuple, Result, Value};
use lamina_heap::Heap;

use crate::model::constraint::ConstraintSet;

/// Declared kind of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKind {
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Bool,
    /// UTF-8 string
    Str,
    /// List of values
    List,
    /// Fixed-arity tuple, stored as a list
    Tuple(usize),
    /// Reference to another model's instance, stored as its id
    Foreign(String),
}

/// Metadata controlling storage, coercion, defaults, nullability, and
/// constraints for one field of a model
///
/// Built through the kind-specific constructors and the chained setters:
///
/// ```
/// use lamina_engine::AttrDescriptor;
///
/// let tag = AttrDescriptor::string("tag").nullable();
/// let position = AttrDescriptor::tuple("position", 2).default_value((0, 0));
/// ```
#[derive(Debug)]
pub struct AttrDescriptor {
    name: String,
    model: String,
    kind: AttrKind,
    nullable: bool,
    default: Option<Value>,
    on_change: ConstraintSet,
}

impl AttrDescriptor {
    fn new(name: &str, kind: AttrKind) -> Self {
        Self {
            name: name.to_string(),
            model: String::new(),
            kind,
            nullable: false,
            default: None,
            on_change: ConstraintSet::default(),
        }
    }

    /// Integer attribute
    pub fn int(name: &str) -> Self {
        Self::new(name, AttrKind::Int)
    }

    /// Float attribute
    pub fn float(name: &str) -> Self {
        Self::new(name, AttrKind::Float)
    }

    /// Boolean attribute
    pub fn boolean(name: &str) -> Self {
        Self::new(name, AttrKind::Bool)
    }

    /// String attribute
    pub fn string(name: &str) -> Self {
        Self::new(name, AttrKind::Str)
    }

    /// List attribute
    pub fn list(name: &str) -> Self {
        Self::new(name, AttrKind::List)
    }

    /// Fixed-arity tuple attribute
    pub fn tuple(name: &str, arity: usize) -> Self {
        Self::new(name, AttrKind::Tuple(arity))
    }

    /// Foreign-reference attribute; stores the referent's id
    pub fn foreign(name: &str, model: &str) -> Self {
        Self::new(name, AttrKind::Foreign(model.to_string()))
    }

    /// Permit null; an omitted constructor value assigns null
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Default used when the constructor omits this attribute
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Declared kind
    pub fn kind(&self) -> &AttrKind {
        &self.kind
    }

    /// Whether null is a legal value
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Declared default, if any
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether this is a foreign reference
    pub fn is_foreign(&self) -> bool {
        matches!(self.kind, AttrKind::Foreign(_))
    }

    /// Referenced model, for foreign attributes
    pub fn foreign_model(&self) -> Option<&str> {
        match &self.kind {
            AttrKind::Foreign(model) => Some(model),
            _ => None,
        }
    }

    /// Constraints attached to on-change events
    pub fn constraints(&self) -> &ConstraintSet {
        &self.on_change
    }

    pub(crate) fn constraints_mut(&mut self) -> &mut ConstraintSet {
        &mut self.on_change
    }

    pub(crate) fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    /// Coerce an incoming value to the stored form
    ///
    /// Tuple kinds coerce any list through [`FixedTuple`]: missing positions
    /// pad with null, extras are dropped. Null and all other kinds pass
    /// through unchanged.
    pub fn coerce(&self, value: Value) -> Value {
        match (&self.kind, &value) {
            (AttrKind::Tuple(arity), Value::List(_)) => {
                match FixedTuple::from_value(*arity, &value) {
                    Some(tuple) => tuple.into(),
                    None => value,
                }
            }
            _ => value,
        }
    }

    /// Check a declared default against the attribute kind
    ///
    /// Called by the schema builder after coercion; a mismatch is a
    /// configuration error.
    pub(crate) fn validate_default(&self) -> Result<()> {
        let Some(default) = &self.default else {
            return Ok(());
        };
        let ok = match &self.kind {
            AttrKind::Int => default.as_int().is_some(),
            AttrKind::Float => default.as_float().is_some(),
            AttrKind::Bool => default.as_bool().is_some(),
            AttrKind::Str => default.as_str().is_some(),
            AttrKind::List => default.as_list().is_some(),
            AttrKind::Tuple(arity) => default
                .as_list()
                .map(|items| items.len() == *arity)
                .unwrap_or(false),
            AttrKind::Foreign(_) => default.as_int().is_some(),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid_model(
                &self.model,
                format!(
                    "default {} does not match the kind of attribute '{}'",
                    default, self.name
                ),
            ))
        }
    }

    /// Heap address of this attribute for a given instance
    pub fn address(&self, id: i64) -> Address {
        Address::attr(&self.model, id, &self.name)
    }

    pub(crate) fn read(&self, heap: &Heap, id: i64) -> Option<Value> {
        heap.get(self.address(id))
    }

    pub(crate) fn write(&self, heap: &Heap, id: i64, value: Value) {
        heap.set(self.address(id), value);
    }

    pub(crate) fn remove(&self, heap: &Heap, id: i64) {
        heap.delete(self.address(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_model(mut desc: AttrDescriptor) -> AttrDescriptor {
        desc.set_model("Infantry");
        desc
    }

    #[test]
    fn test_address_layout() {
        let desc = with_model(AttrDescriptor::int("health"));
        assert_eq!(desc.address(7).to_string(), "Infantry/O/7/health");
    }

    #[test]
    fn test_tuple_coercion() {
        let desc = AttrDescriptor::tuple("position", 2);
        let coerced = desc.coerce(Value::List(vec![Value::Int(1)]));
        assert_eq!(coerced, Value::List(vec![Value::Int(1), Value::Null]));

        let truncated = desc.coerce(Value::from((1, 2)));
        assert_eq!(truncated, Value::from((1, 2)));
    }

    #[test]
    fn test_non_tuple_values_pass_through() {
        let desc = AttrDescriptor::int("health");
        assert_eq!(desc.coerce(Value::Int(5)), Value::Int(5));
        let tuple_desc = AttrDescriptor::tuple("position", 2);
        assert_eq!(tuple_desc.coerce(Value::Null), Value::Null);
    }

    #[test]
    fn test_default_validation() {
        let ok = with_model(AttrDescriptor::tuple("position", 2).default_value((0, 0)));
        assert!(ok.validate_default().is_ok());

        let bad = with_model(AttrDescriptor::int("health").default_value("full"));
        let err = bad.validate_default().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_foreign_accessors() {
        let desc = AttrDescriptor::foreign("board", "Board");
        assert!(desc.is_foreign());
        assert_eq!(desc.foreign_model(), Some("Board"));
        assert!(!AttrDescriptor::int("health").is_foreign());
    }

    #[test]
    fn test_heap_roundtrip() {
        let heap = Heap::new(64);
        let desc = with_model(AttrDescriptor::int("health"));
        desc.write(&heap, 1, Value::Int(10));
        assert_eq!(desc.read(&heap, 1), Some(Value::Int(10)));
        desc.remove(&heap, 1);
        assert_eq!(desc.read(&heap, 1), None);
    }
}
