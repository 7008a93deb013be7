//! Runtime values
//!
//! Template data arrives as anything `Serialize` and is converted to [`Value`]
//! once, at the start of a render.

use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{ErrorDetail, LiquidError};
use crate::undefined::Undefined;

// ============================================================================
// Value
// ============================================================================

/// A value in a render context
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A string that is safe to output without HTML escaping
    Markup(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// An inclusive integer range, empty when `start > stop`
    Range(i64, i64),
    /// The `empty` keyword
    Empty,
    /// The `blank` keyword
    Blank,
    Undefined(Undefined),
}

impl Value {
    /// Convert from serde_json::Value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => Value::Array(arr.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil | Value::Undefined(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Markup(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => serde_json::Value::Array(arr.iter().map(|v| v.to_json()).collect()),
            Value::Object(obj) => {
                let map: serde_json::Map<String, serde_json::Value> =
                    obj.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                serde_json::Value::Object(map)
            }
            Value::Range(start, stop) => match range_items(*start, *stop) {
                Ok(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
                Err(_) => serde_json::Value::String(self.to_string()),
            },
            Value::Empty | Value::Blank => serde_json::Value::String(String::new()),
        }
    }

    /// Convert any serializable data
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self, LiquidError> {
        serde_json::to_value(data)
            .map(|json| Value::from_json(&json))
            .map_err(|e| {
                LiquidError::Type(ErrorDetail::new(
                    format!("can not convert render data: {}", e),
                    None,
                ))
            })
    }

    /// Liquid truthiness: only `false` and `nil` are falsy
    pub fn is_truthy(&self) -> Result<bool, LiquidError> {
        match self {
            Value::Nil | Value::Bool(false) => Ok(false),
            Value::Undefined(u) => u.check().map(|_| false),
            _ => Ok(true),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Number of items, or characters in a string
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::String(s) | Value::Markup(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            Value::Range(start, stop) => Some(range_len(*start, *stop)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Markup(s) => Some(s),
            _ => None,
        }
    }

    /// Ints and floats only, no coercion
    pub fn as_f64_strict(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Coerce to an integer: floats are truncated and numeric strings parsed
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::String(s) | Value::Markup(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Coerce to a number, keeping integers as integers
    pub fn as_number(&self) -> Option<Value> {
        match self {
            Value::Int(_) | Value::Float(_) => Some(self.clone()),
            Value::String(s) | Value::Markup(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::Int)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(Value::Float))
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) | Value::Markup(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Range(..) => "range",
            Value::Empty => "empty",
            Value::Blank => "blank",
            Value::Undefined(_) => "undefined",
        }
    }

    /// Stringify for output, failing on a strict undefined
    pub fn to_liquid_string(&self, auto_escape: bool) -> Result<String, LiquidError> {
        match self {
            Value::Undefined(u) => u.to_output(),
            Value::Markup(s) => Ok(s.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.to_liquid_string(auto_escape))
                .collect(),
            _ if auto_escape => Ok(html_escape(&self.to_string())),
            _ => Ok(self.to_string()),
        }
    }
}

/// Longest range that is ever expanded into an array of integers
///
/// Loops step through ranges without expanding them, so this only bounds
/// filters, queries and serialization.
pub const MAX_RANGE_ITEMS: usize = 1 << 20;

/// Number of integers in an inclusive range, saturating at `usize::MAX`
pub fn range_len(start: i64, stop: i64) -> usize {
    if start > stop {
        return 0;
    }
    usize::try_from(stop as i128 - start as i128 + 1).unwrap_or(usize::MAX)
}

/// The integers in an inclusive range
pub fn range_items(start: i64, stop: i64) -> Result<Vec<Value>, LiquidError> {
    let len = range_len(start, stop);
    if len > MAX_RANGE_ITEMS {
        return Err(LiquidError::Type(ErrorDetail::new(
            format!(
                "range {}..{} has {} items, more than the {} that can be expanded",
                start, stop, len, MAX_RANGE_ITEMS
            ),
            None,
        )));
    }
    Ok((start..=stop).map(Value::Int).collect())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (
                Value::String(a) | Value::Markup(a),
                Value::String(b) | Value::Markup(b),
            ) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Range(a, b), Value::Range(c, d)) => {
                (a == c && b == d) || (range_len(*a, *b) == 0 && range_len(*c, *d) == 0)
            }
            (Value::Empty, Value::Empty) | (Value::Blank, Value::Blank) => true,
            (Value::Undefined(_), Value::Undefined(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil | Value::Empty | Value::Blank => Ok(()),
            Value::Undefined(u) => match u.strategy {
                crate::undefined::UndefinedStrategy::Debug => f.write_str(&u.message()),
                _ => Ok(()),
            },
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) | Value::Markup(s) => f.write_str(s),
            Value::Array(items) => {
                for item in items {
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Object(_) => f.write_str(&self.to_json().to_string()),
            Value::Range(start, stop) => write!(f, "{}..{}", start, stop),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// HTML escape a string
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undefined::UndefinedStrategy;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_order_and_ints() {
        let value = Value::from_json(&json!({"b": 1, "a": 1.5, "c": [true, null]}));
        match &value {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
                assert_eq!(keys, vec!["b", "a", "c"]);
                assert_eq!(map["b"], Value::Int(1));
                assert_eq!(map["a"], Value::Float(1.5));
            }
            other => panic!("expected an object, found {:?}", other),
        }
        assert_eq!(value.to_json(), json!({"b": 1, "a": 1.5, "c": [true, null]}));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy().unwrap());
        assert!(!Value::Bool(false).is_truthy().unwrap());
        assert!(Value::Int(0).is_truthy().unwrap());
        assert!(Value::from("").is_truthy().unwrap());
        assert!(Value::Array(vec![]).is_truthy().unwrap());

        let lax = Value::Undefined(Undefined::new("x", None, UndefinedStrategy::Lax));
        assert!(!lax.is_truthy().unwrap());
        let strict = Value::Undefined(Undefined::new("x", None, UndefinedStrategy::Strict));
        assert!(strict.is_truthy().is_err());
    }

    #[test]
    fn test_to_liquid_string() {
        assert_eq!(Value::Nil.to_liquid_string(false).unwrap(), "");
        assert_eq!(Value::Bool(true).to_liquid_string(false).unwrap(), "true");
        assert_eq!(Value::Float(2.0).to_liquid_string(false).unwrap(), "2.0");
        assert_eq!(Value::Range(1, 3).to_liquid_string(false).unwrap(), "1..3");
        assert_eq!(
            Value::Array(vec![Value::from("a"), Value::Int(1)])
                .to_liquid_string(false)
                .unwrap(),
            "a1"
        );
        assert_eq!(
            Value::from("<b>").to_liquid_string(true).unwrap(),
            "&lt;b&gt;"
        );
        assert_eq!(
            Value::Markup("<b>".into()).to_liquid_string(true).unwrap(),
            "<b>"
        );
    }

    #[test]
    fn test_numeric_equality_and_coercion() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_eq!(Value::from("a"), Value::Markup("a".into()));
        assert_eq!(Value::from(" 42 ").as_int(), Some(42));
        assert_eq!(Value::from("4.7").as_int(), Some(4));
        assert_eq!(Value::Float(-2.9).as_int(), Some(-2));
        assert_eq!(Value::from("x").as_int(), None);
        assert_eq!(Value::Range(3, 1).size(), Some(0));
        assert_eq!(Value::from("héllo").size(), Some(5));
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Page {
            title: String,
            tags: Vec<&'static str>,
        }
        let value = Value::from_serialize(&Page {
            title: "Home".into(),
            tags: vec!["a"],
        })
        .unwrap();
        assert_eq!(value.to_json(), json!({"title": "Home", "tags": ["a"]}));
    }

    #[test]
    fn test_wide_ranges() {
        assert_eq!(range_len(1, 3), 3);
        assert_eq!(range_len(-2, -2), 1);
        assert_eq!(range_len(i64::MAX, i64::MIN), 0);
        assert_eq!(range_len(0, i64::MAX), i64::MAX as usize + 1);
        assert_eq!(range_len(i64::MIN, i64::MAX), usize::MAX);
        assert_eq!(Value::Range(i64::MIN, i64::MAX).size(), Some(usize::MAX));
        assert_eq!(Value::from(usize::MAX), Value::Int(i64::MAX));

        assert_eq!(range_items(1, 3).unwrap(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(range_items(0, i64::MAX), Err(LiquidError::Type(_))));
        assert_eq!(Value::Range(1, 2).to_json(), json!([1, 2]));
        assert_eq!(Value::Range(0, i64::MAX).to_json(), json!("0..9223372036854775807"));
    }
}
