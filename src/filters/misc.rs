//! `default`, `json` and `size`

use crate::value::Value;

use super::{FilterArgs, FilterError, FilterResult};

/// `fallback` if the left value is nil, false, undefined or empty
///
/// With `allow_false: true`, `false` is kept.
pub fn default(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let fallback = args.get(0).cloned().unwrap_or_else(|| Value::from(""));
    let allow_false = match args.keyword("allow_false") {
        Some(value) => value.is_truthy()?,
        None => false,
    };

    let use_fallback = match left {
        Value::Nil | Value::Undefined(_) | Value::Empty | Value::Blank => true,
        Value::Bool(false) => !allow_false,
        Value::String(s) | Value::Markup(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };

    Ok(if use_fallback { fallback } else { left.clone() })
}

/// Serialize to JSON, indented when given a truthy argument
pub fn json(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let pretty = match args.get(0) {
        Some(value) => value.is_truthy()?,
        None => false,
    };

    let json = left.to_json();
    let encoded = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    encoded
        .map(Value::String)
        .map_err(|e| FilterError::argument(format!("can't serialize to JSON: {}", e)))
}

/// Number of items, or characters in a string, or zero
pub fn size(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(Value::from(left.size().unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, no_args};
    use super::*;
    use crate::undefined::{Undefined, UndefinedStrategy};
    use serde_json::json as j;

    #[test]
    fn test_default() {
        let fallback = args(vec![Value::from("x")]);
        assert_eq!(default(&Value::Nil, &fallback).unwrap(), Value::from("x"));
        assert_eq!(default(&Value::from(""), &fallback).unwrap(), Value::from("x"));
        assert_eq!(default(&Value::Bool(false), &fallback).unwrap(), Value::from("x"));
        assert_eq!(default(&Value::Int(0), &fallback).unwrap(), Value::Int(0));
        assert_eq!(default(&Value::Nil, &no_args()).unwrap(), Value::from(""));

        let undefined = Value::Undefined(Undefined::new("x", None, UndefinedStrategy::StrictDefault));
        assert_eq!(default(&undefined, &fallback).unwrap(), Value::from("x"));

        let mut allow_false = args(vec![Value::from("x")]);
        allow_false.keyword.push(("allow_false".to_string(), Value::Bool(true)));
        assert_eq!(default(&Value::Bool(false), &allow_false).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_json() {
        let value = Value::from_json(&j!({"a": [1, "b", null]}));
        assert_eq!(json(&value, &no_args()).unwrap(), Value::from(r#"{"a":[1,"b",null]}"#));
        assert_eq!(json(&Value::from("x"), &no_args()).unwrap(), Value::from(r#""x""#));
        let pretty = json(&value, &args(vec![Value::Bool(true)])).unwrap();
        assert!(pretty.as_str().unwrap_or_default().contains('\n'));
    }

    #[test]
    fn test_size() {
        assert_eq!(size(&Value::from("héllo"), &no_args()).unwrap(), Value::Int(5));
        assert_eq!(size(&Value::from_json(&j!([1, 2])), &no_args()).unwrap(), Value::Int(2));
        assert_eq!(size(&Value::Range(1, 2), &no_args()).unwrap(), Value::Int(2));
        assert_eq!(size(&Value::Int(7), &no_args()).unwrap(), Value::Int(0));
    }
}
