//! Path-keyed tree store
//!
//! A [`Tree`] is one layer of the heap: a nested mapping addressed by
//! `/`-delimited paths. Writing to a deep path creates the intermediate
//! subtrees on demand; integer keys are atomic and only ever live at the
//! top level. The address space stays human-readable, which keeps heap
//! dumps and audits feasible.

use lamina_core::{Address, Segment, Value};
use std::collections::BTreeMap;

/// One entry in a tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A scalar value
    Leaf(Value),
    /// Deletion marker; shadows lower heap layers
    Tombstone,
    /// A nested subtree
    Tree(Tree),
}

impl Node {
    /// Get the leaf value, if this is a `Leaf`
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Check whether this is a tombstone
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Node::Tombstone)
    }
}

/// A single layer of the heap: a recursive segment → entry mapping
///
/// Equality is structural. Iteration is ordered (integer segments first,
/// then names lexically), so flattened listings are deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    entries: BTreeMap<Segment, Node>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a plain map
    ///
    /// Keys split on `/` like any path write; `Value::Map` entries become
    /// subtrees recursively.
    pub fn from_map(map: &BTreeMap<String, Value>) -> Self {
        let mut tree = Tree::new();
        for (key, value) in map {
            tree.set(key.as_str(), Self::node_from_value(value));
        }
        tree
    }

    fn node_from_value(value: &Value) -> Node {
        match value {
            Value::Map(entries) => Node::Tree(Self::from_map(entries)),
            other => Node::Leaf(other.clone()),
        }
    }

    /// Look up the entry at an address
    pub fn get(&self, addr: impl Into<Address>) -> Option<&Node> {
        self.node(&addr.into())
    }

    /// Look up the entry at an address, by reference
    pub fn node(&self, addr: &Address) -> Option<&Node> {
        let segments = addr.segments();
        let (last, walk) = segments.split_last()?;
        let mut current = self;
        for seg in walk {
            match current.entries.get(seg) {
                Some(Node::Tree(sub)) => current = sub,
                _ => return None,
            }
        }
        current.entries.get(last)
    }

    /// Look up the scalar value at an address
    ///
    /// Subtrees and tombstones read as `None`.
    pub fn value(&self, addr: &Address) -> Option<&Value> {
        self.node(addr).and_then(Node::as_value)
    }

    /// Write an entry at an address, creating intermediate subtrees on demand
    ///
    /// A scalar or tombstone sitting on an intermediate segment is replaced
    /// by a subtree.
    pub fn set(&mut self, addr: impl Into<Address>, node: Node) {
        self.put(&addr.into(), node);
    }

    /// Write a scalar value at an address
    pub fn set_value(&mut self, addr: impl Into<Address>, value: impl Into<Value>) {
        self.set(addr, Node::Leaf(value.into()));
    }

    /// Write an entry at an address, by reference
    pub fn put(&mut self, addr: &Address, node: Node) {
        let segments = addr.segments();
        let (last, walk) = match segments.split_last() {
            Some(parts) => parts,
            None => return,
        };
        let mut current = self;
        for seg in walk {
            let entry = current
                .entries
                .entry(seg.clone())
                .or_insert_with(|| Node::Tree(Tree::new()));
            if !matches!(entry, Node::Tree(_)) {
                *entry = Node::Tree(Tree::new());
            }
            match entry {
                Node::Tree(sub) => current = sub,
                _ => unreachable!(),
            }
        }
        current.entries.insert(last.clone(), node);
    }

    /// Remove the entry at an address
    ///
    /// Returns `true` if an entry was removed. This is a physical removal
    /// within this layer; the heap's logical delete writes a tombstone
    /// instead.
    pub fn delete(&mut self, addr: impl Into<Address>) -> bool {
        let addr = addr.into();
        let segments = addr.segments();
        let (last, walk) = match segments.split_last() {
            Some(parts) => parts,
            None => return false,
        };
        let mut current = self;
        for seg in walk {
            match current.entries.get_mut(seg) {
                Some(Node::Tree(sub)) => current = sub,
                _ => return false,
            }
        }
        current.entries.remove(last).is_some()
    }

    /// Check whether any entry (tombstones included) exists at an address
    pub fn contains(&self, addr: impl Into<Address>) -> bool {
        self.node(&addr.into()).is_some()
    }

    /// Iterate over the top-level entries
    pub fn items(&self) -> impl Iterator<Item = (&Segment, &Node)> {
        self.entries.iter()
    }

    /// Flatten to `(address, entry)` pairs, depth first
    ///
    /// Only leaves and tombstones appear; subtrees contribute their path
    /// prefix. A lone integer segment flattens to an atomic integer address.
    pub fn all_items(&self) -> Vec<(Address, &Node)> {
        let mut out = Vec::new();
        self.collect_items(&mut Vec::new(), &mut out);
        out
    }

    fn collect_items<'a>(
        &'a self,
        prefix: &mut Vec<Segment>,
        out: &mut Vec<(Address, &'a Node)>,
    ) {
        for (seg, node) in &self.entries {
            prefix.push(seg.clone());
            match node {
                Node::Tree(sub) => sub.collect_items(prefix, out),
                other => out.push((Self::join(prefix), other)),
            }
            prefix.pop();
        }
    }

    fn join(segments: &[Segment]) -> Address {
        match segments {
            [Segment::Index(n)] => Address::Index(*n),
            _ => Address::Path(
                segments
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("/"),
            ),
        }
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to a deep plain map
    ///
    /// Tombstones are omitted; integer segments format as their decimal
    /// representation.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        for (seg, node) in &self.entries {
            match node {
                Node::Leaf(v) => {
                    map.insert(seg.to_string(), v.clone());
                }
                Node::Tree(sub) => {
                    map.insert(seg.to_string(), sub.to_value());
                }
                Node::Tombstone => {}
            }
        }
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_keys() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set_value(2, 22);

        assert_eq!(t.get("a").and_then(Node::as_value), Some(&Value::Int(1)));
        assert_eq!(t.get(2).and_then(Node::as_value), Some(&Value::Int(22)));
        assert!(t.get("non-existent-key").is_none());
    }

    #[test]
    fn test_first_level() {
        let mut t = Tree::new();
        t.set_value("a/b", 1);
        t.set_value("a/2", 22);

        assert_eq!(t.get("a/b").and_then(Node::as_value), Some(&Value::Int(1)));
        assert_eq!(t.get("a/2").and_then(Node::as_value), Some(&Value::Int(22)));
        assert!(matches!(t.get("a"), Some(Node::Tree(_))));
        match t.get("a") {
            Some(Node::Tree(sub)) => {
                assert_eq!(sub.get("b").and_then(Node::as_value), Some(&Value::Int(1)));
            }
            _ => panic!("expected subtree"),
        }
        assert!(t.get("non-existent-bucket").is_none());
    }

    #[test]
    fn test_many_levels() {
        let mut t = Tree::new();
        t.set_value("a/b/c/d/e", 1);

        assert_eq!(t.len(), 1);
        assert_eq!(
            t.get("a/b/c/d/e").and_then(Node::as_value),
            Some(&Value::Int(1))
        );
        let sub = match t.get("a") {
            Some(Node::Tree(sub)) => sub,
            _ => panic!("expected subtree at 'a'"),
        };
        assert_eq!(
            sub.get("b/c/d/e").and_then(Node::as_value),
            Some(&Value::Int(1))
        );
        assert!(matches!(sub.get("b/c"), Some(Node::Tree(_))));
    }

    #[test]
    fn test_intermediate_scalar_is_replaced() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set_value("a/b", 2);
        assert!(matches!(t.get("a"), Some(Node::Tree(_))));
        assert_eq!(t.get("a/b").and_then(Node::as_value), Some(&Value::Int(2)));
    }

    #[test]
    fn test_iteration_shallow() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set_value("b", 2);
        t.set_value("sub/c", 3);

        let mut names = Vec::new();
        let mut subtrees = 0;
        for (seg, node) in t.items() {
            names.push(seg.to_string());
            if matches!(node, Node::Tree(_)) {
                subtrees += 1;
            }
        }
        assert_eq!(names, vec!["a", "b", "sub"]);
        assert_eq!(subtrees, 1);
    }

    #[test]
    fn test_all_items_flattened() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set_value("2/f", 6);
        t.set_value("3/2/k", 11);

        let items = t.all_items();
        let paths: Vec<String> = items.iter().map(|(a, _)| a.to_string()).collect();
        assert_eq!(paths, vec!["2/f", "3/2/k", "a"]);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_all_items_atomic_index() {
        let mut t = Tree::new();
        t.set_value(0, "abcde");
        let items = t.all_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, Address::Index(0));
    }

    #[test]
    fn test_len_counts_top_level() {
        let mut t = Tree::new();
        for key in ["a", "b", "c", "d", "e"] {
            t.set_value(key, 1);
        }
        for key in ["2/a", "2/b", "2/c", "2/d", "2/e"] {
            t.set_value(key, 1);
        }
        t.set_value("3/2/a", 1);

        assert_eq!(t.len(), 7);
        match t.get("2") {
            Some(Node::Tree(sub)) => assert_eq!(sub.len(), 5),
            _ => panic!("expected subtree"),
        }
        assert_eq!(t.all_items().len(), 11);
    }

    #[test]
    fn test_structural_equality() {
        let mut t = Tree::new();
        t.set_value("a/b/c", 1);
        t.set_value("b", 2);

        let mut same = Tree::new();
        same.set_value("b", 2);
        same.set_value("a/b/c", 1);

        let mut different = Tree::new();
        different.set_value("b", 2);

        assert_eq!(t, same);
        assert_ne!(t, different);
    }

    #[test]
    fn test_subtree_equality() {
        let mut t = Tree::new();
        t.set_value("2/b", 2);
        t.set_value("2/c", 3);

        let mut expected = Tree::new();
        expected.set_value("b", 2);
        expected.set_value("c", 3);

        match t.get("2") {
            Some(Node::Tree(sub)) => assert_eq!(sub, &expected),
            _ => panic!("expected subtree"),
        }
    }

    #[test]
    fn test_delete() {
        let mut t = Tree::new();
        t.set_value("a/b", 1);
        assert!(t.delete("a/b"));
        assert!(!t.delete("a/b"));
        assert!(t.get("a/b").is_none());
        // Parent subtree survives empty.
        assert!(matches!(t.get("a"), Some(Node::Tree(_))));
    }

    #[test]
    fn test_contains_sees_tombstones() {
        let mut t = Tree::new();
        t.set("a", Node::Tombstone);
        assert!(t.contains("a"));
        assert!(!t.contains("b"));
    }

    #[test]
    fn test_to_value_and_from_map_roundtrip() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set_value("2/a", 1);
        t.set_value("3/2/a", 1);

        let value = t.to_value();
        let map = match &value {
            Value::Map(m) => m.clone(),
            _ => panic!("expected map"),
        };
        assert_eq!(Tree::from_map(&map), t);
    }

    #[test]
    fn test_from_map_splits_paths() {
        let mut map = BTreeMap::new();
        map.insert("a/b".to_string(), Value::Int(1));
        let t = Tree::from_map(&map);
        assert_eq!(t.get("a/b").and_then(Node::as_value), Some(&Value::Int(1)));
    }

    #[test]
    fn test_to_value_omits_tombstones() {
        let mut t = Tree::new();
        t.set_value("a", 1);
        t.set("b", Node::Tombstone);
        let map = match t.to_value() {
            Value::Map(m) => m,
            _ => panic!("expected map"),
        };
        assert!(map.contains_key("a"));
        assert!(!map.contains_key("b"));
    }
}
