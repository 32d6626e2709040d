//! Heap addressing
//!
//! A heap address is either a `/`-delimited path ("Infantry/O/7/health") or
//! an atomic integer key. String paths split into segments; integer keys are
//! never split, so they only ever address the top level of a tree.

use std::fmt;

/// One key in a tree node's map
///
/// Sorts integers before names so iteration order is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Atomic integer key
    Index(i64),
    /// String key (one path component)
    Name(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(n) => write!(f, "{}", n),
            Segment::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Name(s.to_string())
    }
}

impl From<i64> for Segment {
    fn from(n: i64) -> Self {
        Segment::Index(n)
    }
}

/// A heap address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// `/`-delimited path; each component addresses one tree level
    Path(String),
    /// Atomic integer key; addresses the top level only
    Index(i64),
}

impl Address {
    /// Address of an instance attribute: `<model>/O/<id>/<attr>`
    pub fn attr(model: &str, id: i64, attr: &str) -> Address {
        Address::Path(format!("{}/O/{}/{}", model, id, attr))
    }

    /// Address of a model's id-allocation counter: `<model>/IDCOUNTER`
    pub fn id_counter(model: &str) -> Address {
        Address::Path(format!("{}/IDCOUNTER", model))
    }

    /// Split into tree segments
    ///
    /// An integer address yields a single atomic segment. An empty path
    /// yields a single empty-name segment, matching the split semantics of
    /// the path form.
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Address::Path(p) => p.split('/').map(Segment::from).collect(),
            Address::Index(n) => vec![Segment::Index(*n)],
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Path(p) => write!(f, "{}", p),
            Address::Index(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::Path(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address::Path(s)
    }
}

impl From<i64> for Address {
    fn from(n: i64) -> Self {
        Address::Index(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_layout() {
        let addr = Address::attr("Infantry", 7, "health");
        assert_eq!(addr.to_string(), "Infantry/O/7/health");
    }

    #[test]
    fn test_id_counter_layout() {
        let addr = Address::id_counter("Board");
        assert_eq!(addr.to_string(), "Board/IDCOUNTER");
    }

    #[test]
    fn test_path_segments() {
        let addr = Address::from("a/b/c");
        assert_eq!(
            addr.segments(),
            vec![
                Segment::Name("a".into()),
                Segment::Name("b".into()),
                Segment::Name("c".into()),
            ]
        );
    }

    #[test]
    fn test_index_is_atomic() {
        let addr = Address::from(42);
        assert_eq!(addr.segments(), vec![Segment::Index(42)]);
    }

    #[test]
    fn test_single_component_path() {
        let addr = Address::from("top");
        assert_eq!(addr.segments().len(), 1);
    }

    #[test]
    fn test_segment_ordering() {
        // Integers sort before names, integers numerically, names lexically.
        let mut segs = vec![
            Segment::Name("b".into()),
            Segment::Index(10),
            Segment::Name("a".into()),
            Segment::Index(2),
        ];
        segs.sort();
        assert_eq!(
            segs,
            vec![
                Segment::Index(2),
                Segment::Index(10),
                Segment::Name("a".into()),
                Segment::Name("b".into()),
            ]
        );
    }
}
