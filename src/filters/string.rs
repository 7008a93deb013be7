//! String filters

use crate::value::{html_escape, Value};

use super::{int_arg_or, to_string, FilterArgs, FilterError, FilterResult};

/// A filter result built from `left`, staying safe markup if `left` was
fn derived(left: &Value, s: String) -> Value {
    match left {
        Value::Markup(_) => Value::Markup(s),
        _ => Value::String(s),
    }
}

/// An argument joined to `left`, escaped if `left` is safe markup
fn joined_arg(left: &Value, arg: &Value) -> String {
    match (left, arg) {
        (Value::Markup(_), Value::Markup(s)) => s.clone(),
        (Value::Markup(_), other) => html_escape(&to_string(other)),
        (_, other) => to_string(other),
    }
}

fn string_arg(args: &FilterArgs, index: usize, name: &str) -> Result<String, FilterError> {
    args.required(index, name).map(to_string)
}

pub fn append(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let suffix = joined_arg(left, args.required(0, "string")?);
    Ok(derived(left, to_string(left) + &suffix))
}

pub fn prepend(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let prefix = joined_arg(left, args.required(0, "string")?);
    Ok(derived(left, prefix + &to_string(left)))
}

/// Upper case the first character and lower case the rest
pub fn capitalize(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let s = to_string(left);
    let mut chars = s.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };
    Ok(derived(left, capitalized))
}

pub fn downcase(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(derived(left, to_string(left).to_lowercase()))
}

pub fn upcase(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(derived(left, to_string(left).to_uppercase()))
}

pub fn lstrip(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(derived(left, to_string(left).trim_start().to_string()))
}

pub fn rstrip(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(derived(left, to_string(left).trim_end().to_string()))
}

pub fn strip(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(derived(left, to_string(left).trim().to_string()))
}

pub fn strip_newlines(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let s = to_string(left).replace("\r\n", "").replace('\n', "");
    Ok(derived(left, s))
}

pub fn remove(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let pattern = string_arg(args, 0, "string")?;
    Ok(derived(left, to_string(left).replace(&pattern, "")))
}

pub fn remove_first(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let pattern = string_arg(args, 0, "string")?;
    Ok(derived(left, to_string(left).replacen(&pattern, "", 1)))
}

pub fn replace(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let pattern = string_arg(args, 0, "search")?;
    let replacement = args
        .get(1)
        .map(|arg| joined_arg(left, arg))
        .unwrap_or_default();
    Ok(derived(left, to_string(left).replace(&pattern, &replacement)))
}

pub fn replace_first(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let pattern = string_arg(args, 0, "search")?;
    let replacement = args
        .get(1)
        .map(|arg| joined_arg(left, arg))
        .unwrap_or_default();
    Ok(derived(left, to_string(left).replacen(&pattern, &replacement, 1)))
}

/// Split on a separator, or into characters if the separator is empty
pub fn split(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let s = to_string(left);
    let separator = args.get(0).map(to_string).unwrap_or_else(|| " ".to_string());

    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        s.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

/// Shorten to `length` characters, including the `end` marker
pub fn truncate(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let s = to_string(left);
    let length = int_arg_or(args.get(0), 50).max(0) as usize;
    let end = args.get(1).map(to_string).unwrap_or_else(|| "...".to_string());

    if s.chars().count() <= length {
        return Ok(derived(left, s));
    }

    let keep = length.saturating_sub(end.chars().count());
    let truncated: String = s.chars().take(keep).collect();
    Ok(derived(left, truncated + &end))
}

/// Shorten to `words` words, followed by the `end` marker
pub fn truncatewords(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(2)?;
    let s = to_string(left);
    let count = int_arg_or(args.get(0), 15).max(1) as usize;
    let end = args.get(1).map(to_string).unwrap_or_else(|| "...".to_string());

    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= count {
        return Ok(derived(left, s));
    }
    Ok(derived(left, words[..count].join(" ") + &end))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, no_args};
    use super::*;

    fn s(value: &str) -> Value {
        Value::from(value)
    }

    #[test]
    fn test_append_and_prepend() {
        assert_eq!(append(&s("a"), &args(vec![s("b")])).unwrap(), s("ab"));
        assert_eq!(prepend(&Value::Int(1), &args(vec![s("#")])).unwrap(), s("#1"));
        assert!(append(&s("a"), &no_args()).is_err());
        assert_eq!(
            append(&Value::Markup("<b>".into()), &args(vec![s("<i>")])).unwrap(),
            Value::Markup("<b>&lt;i&gt;".into())
        );
    }

    #[test]
    fn test_case_filters() {
        assert_eq!(capitalize(&s("hELLO world"), &no_args()).unwrap(), s("Hello world"));
        assert_eq!(upcase(&s("abc"), &no_args()).unwrap(), s("ABC"));
        assert_eq!(downcase(&s("ABC"), &no_args()).unwrap(), s("abc"));
        assert_eq!(capitalize(&Value::Nil, &no_args()).unwrap(), s(""));
    }

    #[test]
    fn test_strip_filters() {
        assert_eq!(strip(&s("  a  "), &no_args()).unwrap(), s("a"));
        assert_eq!(lstrip(&s("  a  "), &no_args()).unwrap(), s("a  "));
        assert_eq!(rstrip(&s("  a  "), &no_args()).unwrap(), s("  a"));
        assert_eq!(strip_newlines(&s("a\r\nb\nc"), &no_args()).unwrap(), s("abc"));
    }

    #[test]
    fn test_remove_and_replace() {
        assert_eq!(remove(&s("abab"), &args(vec![s("b")])).unwrap(), s("aa"));
        assert_eq!(remove_first(&s("abab"), &args(vec![s("b")])).unwrap(), s("aab"));
        assert_eq!(replace(&s("abab"), &args(vec![s("b"), s("c")])).unwrap(), s("acac"));
        assert_eq!(replace_first(&s("abab"), &args(vec![s("b"), s("c")])).unwrap(), s("acab"));
        assert_eq!(replace(&s("abab"), &args(vec![s("b")])).unwrap(), s("aa"));
    }

    #[test]
    fn test_split() {
        assert_eq!(
            split(&s("a,b"), &args(vec![s(",")])).unwrap(),
            Value::Array(vec![s("a"), s("b")])
        );
        assert_eq!(
            split(&s("ab"), &args(vec![s("")])).unwrap(),
            Value::Array(vec![s("a"), s("b")])
        );
    }

    #[test]
    fn test_truncate() {
        let text = s("Ground control to Major Tom.");
        assert_eq!(truncate(&text, &args(vec![Value::Int(20)])).unwrap(), s("Ground control to..."));
        assert_eq!(
            truncate(&text, &args(vec![Value::Int(25), s(", and so on")])).unwrap(),
            s("Ground control, and so on")
        );
        assert_eq!(truncate(&s("short"), &no_args()).unwrap(), s("short"));
        assert_eq!(truncate(&text, &args(vec![Value::Int(2)])).unwrap(), s("..."));
    }

    #[test]
    fn test_truncatewords() {
        let text = s("Ground control to Major Tom.");
        assert_eq!(truncatewords(&text, &args(vec![Value::Int(3)])).unwrap(), s("Ground control to..."));
        assert_eq!(
            truncatewords(&text, &args(vec![Value::Int(3), s("--")])).unwrap(),
            s("Ground control to--")
        );
        assert_eq!(truncatewords(&text, &args(vec![Value::Int(0)])).unwrap(), s("Ground..."));
    }
}
