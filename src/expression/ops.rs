//! Equality, ordering and membership rules for Liquid values

use crate::error::{LiquidError, Span};
use crate::value::Value;

/// Liquid equality
///
/// `empty` and `blank` get to decide equality when they appear on either
/// side. Booleans are only ever equal to booleans, and `nil` equals an
/// undefined value.
pub fn eq(left: &Value, right: &Value) -> Result<bool, LiquidError> {
    for value in [left, right] {
        if let Value::Undefined(u) = value {
            u.check()?;
        }
    }

    let (left, right) = if matches!(right, Value::Empty | Value::Blank) {
        (right, left)
    } else {
        (left, right)
    };

    let equal = match (left, right) {
        (Value::Empty, other) => is_empty(other),
        (Value::Blank, other) => is_blank(other),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
        (Value::Nil | Value::Undefined(_), Value::Nil | Value::Undefined(_)) => true,
        (a, b) => a == b,
    };
    Ok(equal)
}

/// `left < right`
///
/// Comparing a boolean to anything is always false. Mismatched types are an
/// error, except for lax undefined values which compare false.
pub fn lt(left: &Value, right: &Value, span: Span) -> Result<bool, LiquidError> {
    match (left, right) {
        (Value::String(a) | Value::Markup(a), Value::String(b) | Value::Markup(b)) => Ok(a < b),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => Ok(false),
        (Value::Int(a), Value::Int(b)) => Ok(a < b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (left.as_f64_strict(), right.as_f64_strict()) {
                (Some(a), Some(b)) => Ok(a < b),
                _ => Ok(false),
            }
        }
        (Value::Undefined(u), _) | (_, Value::Undefined(u)) => u.check().map(|_| false),
        _ => Err(LiquidError::type_error(
            format!(
                "'<' and '>' are not supported between '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

/// `left contains right`
pub fn contains(left: &Value, right: &Value, span: Span) -> Result<bool, LiquidError> {
    if let Value::Undefined(u) = right {
        u.check()?;
    }

    match left {
        Value::String(s) | Value::Markup(s) => Ok(s.contains(&right.to_liquid_string(false)?)),
        Value::Array(items) => {
            for item in items {
                if eq(item, right)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Object(map) => Ok(right.as_str().map(|k| map.contains_key(k)).unwrap_or(false)),
        Value::Range(start, stop) => Ok(match right {
            Value::Int(i) => start <= i && i <= stop,
            Value::Float(f) if f.fract() == 0.0 => (*start as f64) <= *f && *f <= (*stop as f64),
            _ => false,
        }),
        Value::Undefined(u) => u.check().map(|_| false),
        _ => Err(LiquidError::type_error(
            format!(
                "'in' and 'contains' are not supported between '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

/// Build an inclusive range, coercing each bound to an integer or zero
pub fn make_range(start: &Value, stop: &Value) -> Value {
    let start = start.as_int().unwrap_or(0);
    let stop = stop.as_int().unwrap_or(0);
    Value::Range(start, stop)
}

/// `""`, `[]` or `{}`
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) | Value::Markup(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Empty => true,
        _ => false,
    }
}

/// Empty, or a string made only of whitespace
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) | Value::Markup(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Blank => true,
        _ => false,
    }
}
