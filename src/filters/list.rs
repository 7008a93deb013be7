//! Array filters
//!
//! Most of these coerce their left value with [`sequence`], so a string or
//! an object is treated as a sequence of one item.

use std::cmp::Ordering;

use crate::environment::Environment;
use crate::value::{html_escape, Value};

use super::{int_arg, sequence, to_string, FilterArgs, FilterError, FilterResult};

/// Property `key` of an object, or nil
fn property<'v>(item: &'v Value, key: &str) -> Option<&'v Value> {
    match item {
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

fn key_arg(args: &FilterArgs) -> Result<Option<String>, FilterError> {
    args.expect_at_most(1)?;
    Ok(args.get(0).filter(|v| !v.is_nil()).map(to_string))
}

/// Join items with a separator, escaping each one when auto escape is on
pub fn join(left: &Value, args: &FilterArgs, env: &Environment) -> FilterResult {
    args.expect_at_most(1)?;
    let separator = args.get(0).map(to_string).unwrap_or_else(|| " ".to_string());
    let items = sequence(left)?;

    if !env.config.auto_escape {
        let parts: Vec<String> = items.iter().map(to_string).collect();
        return Ok(Value::String(parts.join(&separator)));
    }

    let escaped = |value: &Value| match value {
        Value::Markup(s) => s.clone(),
        other => html_escape(&to_string(other)),
    };
    let separator = match args.get(0) {
        Some(arg) => escaped(arg),
        None => separator,
    };
    let parts: Vec<String> = items.iter().map(escaped).collect();
    Ok(Value::Markup(parts.join(&separator)))
}

pub fn first(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(match left {
        Value::Array(items) => items.first().cloned().unwrap_or_default(),
        Value::Range(start, stop) if start <= stop => Value::Int(*start),
        Value::Object(map) => map
            .iter()
            .next()
            .map(|(k, v)| Value::Array(vec![Value::from(k.as_str()), v.clone()]))
            .unwrap_or_default(),
        _ => Value::Nil,
    })
}

pub fn last(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(match left {
        Value::Array(items) => items.last().cloned().unwrap_or_default(),
        Value::Range(start, stop) if start <= stop => Value::Int(*stop),
        _ => Value::Nil,
    })
}

pub fn reverse(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let mut items = sequence(left)?;
    items.reverse();
    Ok(Value::Array(items))
}

/// Append the items of another array
pub fn concat(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let other = match args.required(0, "array")? {
        other @ (Value::Array(_) | Value::Range(..)) => sequence(other)?,
        other => {
            return Err(FilterError::argument(format!(
                "expected an array, found {}",
                other.type_name()
            )))
        }
    };
    let mut items = sequence(left)?;
    items.extend(other);
    Ok(Value::Array(items))
}

/// Property `key` of each item
pub fn map(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let key = to_string(args.required(0, "key")?);

    sequence(left)?
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map.get(&key).cloned().unwrap_or_default()),
            Value::Nil => Ok(Value::Nil),
            other => Err(FilterError::argument(format!(
                "can't map '{}' over {}",
                key,
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Items whose property `key` equals `value`, or is truthy without a value
pub fn where_(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let key = to_string(args.required(0, "key")?);
    let wanted = args.get(1).filter(|v| !v.is_nil() && !v.is_undefined());

    let mut matches = Vec::new();
    for item in sequence(left)? {
        let keep = match (property(&item, &key), wanted) {
            (Some(value), Some(wanted)) => value == wanted,
            (Some(value), None) => value.is_truthy()?,
            (None, _) => false,
        };
        if keep {
            matches.push(item);
        }
    }
    Ok(Value::Array(matches))
}

/// Remove nil items, or items whose property `key` is nil
pub fn compact(left: &Value, args: &FilterArgs) -> FilterResult {
    let key = key_arg(args)?;
    let items = sequence(left)?
        .into_iter()
        .filter(|item| match &key {
            Some(key) => property(item, key).map_or(false, |v| !v.is_nil()),
            None => !item.is_nil(),
        })
        .collect();
    Ok(Value::Array(items))
}

/// Remove duplicate items, or items with a duplicate property `key`
pub fn uniq(left: &Value, args: &FilterArgs) -> FilterResult {
    let key = key_arg(args)?;
    let mut seen: Vec<Value> = Vec::new();
    let mut unique = Vec::new();

    for item in sequence(left)? {
        let identity = match &key {
            Some(key) => property(&item, key).cloned().unwrap_or_default(),
            None => item.clone(),
        };
        if !seen.contains(&identity) {
            seen.push(identity);
            unique.push(item);
        }
    }
    Ok(Value::Array(unique))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_f64_strict()?.partial_cmp(&b.as_f64_strict()?)
        }
        (
            Value::String(a) | Value::Markup(a),
            Value::String(b) | Value::Markup(b),
        ) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Sort items, or by property `key`, with missing and nil values last
pub fn sort(left: &Value, args: &FilterArgs) -> FilterResult {
    let key = key_arg(args)?;
    let mut items = sequence(left)?;
    let mut incomparable = false;

    let sort_key = |item: &Value| -> Value {
        match &key {
            Some(key) => property(item, key).cloned().unwrap_or_default(),
            None => item.clone(),
        }
    };

    items.sort_by(|a, b| {
        let (a, b) = (sort_key(a), sort_key(b));
        match (a.is_nil(), b.is_nil()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(&a, &b).unwrap_or_else(|| {
                incomparable = true;
                Ordering::Equal
            }),
        }
    });

    if incomparable {
        return Err(FilterError::argument("can't sort sequence of mixed types"));
    }
    Ok(Value::Array(items))
}

/// A substring or sub-array starting at `offset`, which counts from the end
/// when negative
pub fn slice(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let offset = int_arg(args.required(0, "offset")?)?;
    let length = match args.get(1) {
        Some(length) => int_arg(length)?.max(0) as usize,
        None => 1,
    };

    let bounds = |len: usize| -> (usize, usize) {
        let start = if offset < 0 {
            len.saturating_sub(offset.unsigned_abs() as usize)
        } else {
            (offset as usize).min(len)
        };
        (start, start.saturating_add(length).min(len))
    };

    Ok(match left {
        Value::String(_) | Value::Markup(_) => {
            let chars: Vec<char> = to_string(left).chars().collect();
            let (start, end) = bounds(chars.len());
            Value::String(chars[start..end].iter().collect())
        }
        other => {
            let items = sequence(other)?;
            let (start, end) = bounds(items.len());
            Value::Array(items[start..end].to_vec())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, no_args};
    use super::*;
    use crate::config::EnvironmentConfig;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    fn one(value: impl Into<Value>) -> FilterArgs {
        args(vec![value.into()])
    }

    #[test]
    fn test_join() {
        let env = Environment::new();
        assert_eq!(
            join(&v(json!(["a", 1, "b"])), &one(", "), &env).unwrap(),
            Value::from("a, 1, b")
        );
        assert_eq!(join(&v(json!(["a", "b"])), &no_args(), &env).unwrap(), Value::from("a b"));
    }

    #[test]
    fn test_join_auto_escape() {
        let env = Environment::with_config(EnvironmentConfig {
            auto_escape: true,
            ..Default::default()
        });
        let items = Value::Array(vec![Value::from("<a>"), Value::Markup("<b>".into())]);
        assert_eq!(
            join(&items, &one("&"), &env).unwrap(),
            Value::Markup("&lt;a&gt;&amp;<b>".into())
        );
    }

    #[test]
    fn test_first_and_last() {
        assert_eq!(first(&v(json!([1, 2])), &no_args()).unwrap(), Value::Int(1));
        assert_eq!(last(&v(json!([1, 2])), &no_args()).unwrap(), Value::Int(2));
        assert_eq!(last(&Value::Range(1, 4), &no_args()).unwrap(), Value::Int(4));
        assert_eq!(first(&v(json!([])), &no_args()).unwrap(), Value::Nil);
        assert_eq!(first(&Value::from("abc"), &no_args()).unwrap(), Value::Nil);
    }

    #[test]
    fn test_concat_and_reverse() {
        assert_eq!(
            concat(&v(json!([1])), &one(v(json!([2, [3]])))).unwrap(),
            v(json!([1, 2, 3]))
        );
        assert!(concat(&v(json!([1])), &one("x")).is_err());
        assert_eq!(reverse(&Value::Range(1, 3), &no_args()).unwrap(), v(json!([3, 2, 1])));
    }

    #[test]
    fn test_map_and_where() {
        let products = v(json!([
            {"title": "hat", "available": true, "type": "a"},
            {"title": "shirt", "available": false, "type": "b"},
            {"title": "coat", "type": "a"},
        ]));
        assert_eq!(
            map(&products, &one("title")).unwrap(),
            v(json!(["hat", "shirt", "coat"]))
        );
        assert_eq!(
            map(&where_(&products, &args(vec!["type".into(), "a".into()])).unwrap(), &one("title"))
                .unwrap(),
            v(json!(["hat", "coat"]))
        );
        assert_eq!(
            map(&where_(&products, &one("available")).unwrap(), &one("title")).unwrap(),
            v(json!(["hat"]))
        );
        assert!(map(&v(json!([1])), &one("x")).is_err());
    }

    #[test]
    fn test_compact_and_uniq() {
        assert_eq!(compact(&v(json!([1, null, 2])), &no_args()).unwrap(), v(json!([1, 2])));
        assert_eq!(
            compact(&v(json!([{"a": 1}, {"a": null}, {}])), &one("a")).unwrap(),
            v(json!([{"a": 1}]))
        );
        assert_eq!(uniq(&v(json!([1, 2, 1, "1"])), &no_args()).unwrap(), v(json!([1, 2, "1"])));
        assert_eq!(
            uniq(&v(json!([{"a": 1, "b": 1}, {"a": 1, "b": 2}])), &one("a")).unwrap(),
            v(json!([{"a": 1, "b": 1}]))
        );
    }

    #[test]
    fn test_sort() {
        assert_eq!(sort(&v(json!([3, 1.5, 2])), &no_args()).unwrap(), v(json!([1.5, 2, 3])));
        assert_eq!(
            sort(&v(json!(["b", "a", "C"])), &no_args()).unwrap(),
            v(json!(["C", "a", "b"]))
        );
        assert_eq!(
            sort(&v(json!([{"n": 2}, {}, {"n": 1}])), &one("n")).unwrap(),
            v(json!([{"n": 1}, {"n": 2}, {}]))
        );
        assert!(sort(&v(json!([1, "a"])), &no_args()).is_err());
    }

    #[test]
    fn test_slice() {
        assert_eq!(slice(&Value::from("Liquid"), &one(0)).unwrap(), Value::from("L"));
        assert_eq!(
            slice(&Value::from("Liquid"), &args(vec![Value::Int(2), Value::Int(5)])).unwrap(),
            Value::from("quid")
        );
        assert_eq!(
            slice(&Value::from("Liquid"), &args(vec![Value::Int(-3), Value::Int(2)])).unwrap(),
            Value::from("ui")
        );
        assert_eq!(
            slice(&v(json!([1, 2, 3])), &args(vec![Value::Int(1), Value::Int(5)])).unwrap(),
            v(json!([2, 3]))
        );
        assert!(slice(&Value::from("x"), &one("y")).is_err());
    }
}
