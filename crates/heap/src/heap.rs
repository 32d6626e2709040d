//! Versioned heap
//!
//! The heap is an ordered stack of [`Tree`] layers. Writes and deletes
//! always target the top layer; deletes write a [`Node::Tombstone`] so the
//! shadowed value in a lower layer stays hidden. Reads traverse the stack
//! top to bottom and return the first hit, with a tombstone short-circuiting
//! to "absent".
//!
//! `checkpoint` pushes a fresh top layer and `revert` pops it, restoring
//! exactly the observable state from before the checkpoint. `collapse` folds
//! everything into a single layer: same observable state, no more history.

use lamina_core::{Address, Error, Result, Value};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::fmt;

use crate::tree::{Node, Tree};

/// The versioned, path-addressed key-value store holding all live data
///
/// A single reentrant lock serializes all operations within the process;
/// same-thread reentry (constraint evaluation reading the heap mid-write
/// sequence) is legal. The `size` is a capacity hint used for utilization
/// reporting, not an enforced limit.
pub struct Heap {
    size: usize,
    layers: ReentrantMutex<RefCell<Vec<Tree>>>,
}

impl Heap {
    /// Create a heap with the given nominal capacity
    ///
    /// The stack starts with one empty base layer; the base layer is never
    /// popped.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            layers: ReentrantMutex::new(RefCell::new(vec![Tree::new()])),
        }
    }

    /// Read the value at an address
    ///
    /// Layers are scanned top to bottom. A tombstone on the way down means
    /// "deleted" and surfaces as `None`. A subtree hit materializes as a
    /// `Value::Map` snapshot of that layer's subtree.
    pub fn get(&self, addr: impl Into<Address>) -> Option<Value> {
        let addr = addr.into();
        let guard = self.layers.lock();
        let layers = guard.borrow();
        for layer in layers.iter().rev() {
            match layer.node(&addr) {
                Some(Node::Tombstone) => return None,
                Some(Node::Leaf(v)) => return Some(v.clone()),
                Some(Node::Tree(sub)) => return Some(sub.to_value()),
                None => {}
            }
        }
        None
    }

    /// Write a value at an address, always into the top layer
    pub fn set(&self, addr: impl Into<Address>, value: impl Into<Value>) {
        let addr = addr.into();
        let guard = self.layers.lock();
        let mut layers = guard.borrow_mut();
        let top = layers.last_mut().expect("heap always has a base layer");
        top.put(&addr, Node::Leaf(value.into()));
    }

    /// Delete the value at an address
    ///
    /// Writes a tombstone into the top layer; lower layers are untouched and
    /// stay shadowed until the tombstone's layer is reverted away.
    pub fn delete(&self, addr: impl Into<Address>) {
        let addr = addr.into();
        let guard = self.layers.lock();
        let mut layers = guard.borrow_mut();
        let top = layers.last_mut().expect("heap always has a base layer");
        top.put(&addr, Node::Tombstone);
    }

    /// Check whether an address currently resolves to a value
    pub fn contains(&self, addr: impl Into<Address>) -> bool {
        let addr = addr.into();
        let guard = self.layers.lock();
        let layers = guard.borrow();
        for layer in layers.iter().rev() {
            match layer.node(&addr) {
                Some(Node::Tombstone) => return false,
                Some(_) => return true,
                None => {}
            }
        }
        false
    }

    /// Push a new empty top layer
    pub fn checkpoint(&self) {
        let guard = self.layers.lock();
        let mut layers = guard.borrow_mut();
        layers.push(Tree::new());
        tracing::debug!(depth = layers.len(), "heap checkpoint");
    }

    /// Pop the top layer, restoring the pre-checkpoint state
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoCheckpoint`] when only the base layer remains.
    pub fn revert(&self) -> Result<()> {
        let guard = self.layers.lock();
        let mut layers = guard.borrow_mut();
        if layers.len() == 1 {
            return Err(Error::NoCheckpoint);
        }
        layers.pop();
        tracing::debug!(depth = layers.len(), "heap revert");
        Ok(())
    }

    /// Fold all layers into a single layer, dropping tombstones
    ///
    /// Observable state is unchanged, but prior states become unreachable:
    /// the next `revert` fails until a new checkpoint is pushed.
    pub fn collapse(&self) {
        let folded = self.collapsed_view(false);
        let guard = self.layers.lock();
        let mut layers = guard.borrow_mut();
        *layers = vec![folded];
        tracing::debug!("heap collapsed");
    }

    /// Build a single-layer view of the current observable state
    ///
    /// Layers merge bottom to top, last write wins. With
    /// `keep_tombstones` the surviving deletion markers stay in the view;
    /// without it they (and everything they shadow) are absent.
    pub fn collapsed_view(&self, keep_tombstones: bool) -> Tree {
        let guard = self.layers.lock();
        let layers = guard.borrow();
        let mut merged = Tree::new();
        for layer in layers.iter() {
            for (addr, node) in layer.all_items() {
                merged.put(&addr, node.clone());
            }
        }
        if keep_tombstones {
            return merged;
        }
        let mut live = Tree::new();
        for (addr, node) in merged.all_items() {
            if !node.is_tombstone() {
                live.put(&addr, node.clone());
            }
        }
        live
    }

    /// Number of live entries, counted through a collapsed view
    pub fn len(&self) -> usize {
        self.collapsed_view(false).all_items().len()
    }

    /// Check whether the heap holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The nominal capacity hint
    pub fn size(&self) -> usize {
        self.size
    }

    /// Live entries as a fraction of the nominal capacity, in percent
    pub fn percent_used(&self) -> f64 {
        self.len() as f64 / self.size as f64 * 100.0
    }

    /// Number of layers on the version stack
    pub fn depth(&self) -> usize {
        let guard = self.layers.lock();
        let layers = guard.borrow();
        layers.len()
    }
}

impl fmt::Display for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Heap {:.1}% used, size={}, depth={}>",
            self.percent_used(),
            self.size,
            self.depth()
        )
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("size", &self.size)
            .field("depth", &self.depth())
            .field("len", &self.len())
            .finish()
    }
}
