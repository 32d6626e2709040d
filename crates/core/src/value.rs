//! Unified value type for the heap and instruction arguments
//!
//! Everything the VM stores or serializes bottoms out in [`Value`]: attribute
//! data in the heap, instruction arguments, and the snapshot maps carried by
//! `INST` instructions. Maps use `BTreeMap` so iteration order (and therefore
//! mnemonic serialization and commit hashing) is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Unified value type for all heap entries and instruction arguments
///
/// The untagged serde representation maps each variant to its natural JSON
/// form, which is exactly the mnemonic wire encoding: scalars as themselves,
/// lists as arrays, maps as objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null / absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered list of values
    List(Vec<Value>),
    /// String-keyed map with deterministic iteration order
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Check whether this value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the integer payload, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the float payload, if this is a `Float`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the boolean payload, if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the string payload, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list payload, if this is a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the map payload, if this is a `Map`
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert to the JSON wire form
    ///
    /// # Errors
    ///
    /// Non-finite floats cannot be represented in JSON and are rejected as a
    /// serialization error at any nesting depth; the commit hash input must
    /// stay deterministic.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    Error::serialization(format!("non-finite float {} has no JSON form", f))
                }),
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::List(items) => Ok(serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_>>()?,
            )),
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(map))
            }
        }
    }

    /// Reconstruct a value from its JSON wire form
    ///
    /// Integers that fit `i64` become `Int`; other numbers become `Float`.
    /// Numbers above `i64::MAX` are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::serialization(format!("number {} out of range", n)))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => Ok(Value::List(
                items.iter().map(Value::from_json).collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    map.insert(k.clone(), Value::from_json(v)?);
                }
                Ok(Value::Map(map))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Build a `Value::List` from a pair of coordinates
///
/// Convenience for the common `(x, y)` tuple-attribute literal.
impl From<(i64, i64)> for Value {
    fn from((x, y): (i64, i64)) -> Self {
        Value::List(vec![Value::Int(x), Value::Int(y)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(42).as_float(), None);
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::String("hi".into()).as_str(), Some("hi"));
        assert!(Value::List(vec![Value::Int(1)]).as_list().is_some());
        assert!(Value::Map(BTreeMap::new()).as_map().is_some());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(1i64), Value::Int(1));
        assert_eq!(Value::from(1i32), Value::Int(1));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(
            Value::from((3, 4)),
            Value::List(vec![Value::Int(3), Value::Int(4)])
        );
    }

    #[test]
    fn test_json_roundtrip_scalars() {
        let values = vec![
            Value::Null,
            Value::Bool(false),
            Value::Int(-7),
            Value::Float(1.5),
            Value::String("abc".into()),
        ];
        for v in values {
            let json = v.to_json().unwrap();
            assert_eq!(Value::from_json(&json).unwrap(), v);
        }
    }

    #[test]
    fn test_json_roundtrip_compound() {
        let mut map = BTreeMap::new();
        map.insert("position".to_string(), Value::from((1, 1)));
        map.insert("tag".to_string(), Value::Null);
        let v = Value::Map(map);
        let json = v.to_json().unwrap();
        assert_eq!(Value::from_json(&json).unwrap(), v);
    }

    #[test]
    fn test_json_integer_stays_integer() {
        let json = serde_json::json!(5);
        assert_eq!(Value::from_json(&json).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = Value::Float(f64::NAN).to_json().unwrap_err();
        assert!(err.is_serialization());
        assert!(Value::Float(f64::INFINITY).to_json().is_err());
        // Rejected at any depth, not just the top level.
        let nested = Value::List(vec![Value::Float(f64::NAN)]);
        assert!(nested.to_json().is_err());
    }

    #[test]
    fn test_map_order_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), Value::Int(2));
        a.insert("a".to_string(), Value::Int(1));
        let json = Value::Map(a).to_json().unwrap();
        assert_eq!(serde_json::to_string(&json).unwrap(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from((1, 2)).to_string(), "(1, 2)");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::String("x".into()).to_string(), "x");
    }
}
