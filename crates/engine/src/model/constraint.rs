//! On-change constraints
//!
//! A constraint is a named predicate attached to one attribute. On every
//! user-mode write the attribute's constraints run in insertion order against
//! the current (pre-write) target value, the proposed new value, and a
//! pre-write snapshot of the declared related attributes; the first predicate
//! that returns `false` aborts the write.

use lamina_core::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::instruction::Operand;
use crate::model::instance::ModelInstance;
use crate::vm::Vm;

/// Predicate type for on-change constraints
pub type ConstraintFn = Arc<dyn Fn(&ConstraintCtx<'_>) -> bool + Send + Sync>;

/// Evaluation context handed to a constraint predicate
///
/// `old` is the pre-write value of the target attribute (`Null` when unset),
/// `new` the proposed value. Related attributes snapshot before the write;
/// a foreign related attribute snapshots as an instance handle so the
/// predicate can read the referent's attributes through `vm`.
pub struct ConstraintCtx<'a> {
    /// The VM evaluating the write
    pub vm: &'a Vm,
    /// The instance being written
    pub instance: &'a ModelInstance,
    /// Current (pre-write) value of the target attribute
    pub old: Value,
    /// Proposed new value
    pub new: Value,
    related: BTreeMap<String, Operand>,
}

impl<'a> ConstraintCtx<'a> {
    pub(crate) fn new(
        vm: &'a Vm,
        instance: &'a ModelInstance,
        old: Value,
        new: Value,
        related: BTreeMap<String, Operand>,
    ) -> Self {
        Self {
            vm,
            instance,
            old,
            new,
            related,
        }
    }

    /// Snapshot of a related attribute
    pub fn related(&self, name: &str) -> Option<&Operand> {
        self.related.get(name)
    }

    /// Snapshot of a related scalar attribute
    pub fn related_value(&self, name: &str) -> Option<&Value> {
        self.related.get(name).and_then(Operand::as_value)
    }

    /// Snapshot of a related foreign attribute, as an instance handle
    pub fn related_ref(&self, name: &str) -> Option<&ModelInstance> {
        self.related.get(name).and_then(Operand::instance)
    }
}

/// A named on-change validator for one attribute
pub struct Constraint {
    name: String,
    attribute: String,
    related: Vec<String>,
    predicate: ConstraintFn,
}

impl Constraint {
    /// Define an on-change constraint
    ///
    /// The target attribute is supplied when the constraint is attached via
    /// [`crate::ModelSchemaBuilder::constraint`]. `related` names the
    /// attributes whose pre-write values the predicate wants snapshotted.
    pub fn on_change<F>(name: &str, related: &[&str], predicate: F) -> Self
    where
        F: Fn(&ConstraintCtx<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            attribute: String::new(),
            related: related.iter().map(|s| s.to_string()).collect(),
            predicate: Arc::new(predicate),
        }
    }

    /// Constraint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target attribute (set when attached to a schema)
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Names of the related attributes snapshotted for the predicate
    pub fn related(&self) -> &[String] {
        &self.related
    }

    pub(crate) fn attach(mut self, attribute: &str) -> Self {
        self.attribute = attribute.to_string();
        self
    }

    pub(crate) fn check(&self, ctx: &ConstraintCtx<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("related", &self.related)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.name, self.attribute)
    }
}

/// Ordered collection of constraints on one attribute
///
/// Iteration order is insertion order; the first failing constraint wins.
#[derive(Debug, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub(crate) fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.constraints.iter()
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
