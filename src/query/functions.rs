//! Filter function extensions: `length`, `count`, `match`, `search` and `value`

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;

use super::node::NodeList;
use crate::value::Value;

/// Declared type of a function argument or result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionType {
    Value,
    Logical,
    Nodes,
}

/// The result of evaluating part of a filter expression
#[derive(Debug, Clone)]
pub enum FilterValue<'v> {
    Value(Cow<'v, Value>),
    /// The absence of a value, distinct from JSON null
    Nothing,
    Logical(bool),
    Nodes(NodeList<'v>),
}

impl<'v> FilterValue<'v> {
    /// Coerce to a value: a node list of exactly one node gives its value
    pub fn into_value(self) -> Option<Cow<'v, Value>> {
        match self {
            FilterValue::Value(v) => Some(v),
            FilterValue::Nodes(nodes) if nodes.len() == 1 => {
                nodes.into_nodes().pop().map(|n| n.value)
            }
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FilterValue::Logical(b) => *b,
            FilterValue::Nodes(nodes) => !nodes.is_empty(),
            FilterValue::Value(_) => true,
            FilterValue::Nothing => false,
        }
    }
}

pub trait FunctionExtension: Send + Sync {
    fn arg_types(&self) -> &'static [ExpressionType];

    fn return_type(&self) -> ExpressionType;

    fn call<'v>(&self, args: Vec<FilterValue<'v>>) -> FilterValue<'v>;
}

struct Length;

impl FunctionExtension for Length {
    fn arg_types(&self) -> &'static [ExpressionType] {
        &[ExpressionType::Value]
    }

    fn return_type(&self) -> ExpressionType {
        ExpressionType::Value
    }

    fn call<'v>(&self, mut args: Vec<FilterValue<'v>>) -> FilterValue<'v> {
        let len = match args.pop().and_then(FilterValue::into_value) {
            Some(value) => match value.as_ref() {
                Value::String(s) | Value::Markup(s) => Some(s.chars().count()),
                Value::Array(items) => Some(items.len()),
                Value::Object(map) => Some(map.len()),
                _ => None,
            },
            None => None,
        };
        match len {
            Some(n) => FilterValue::Value(Cow::Owned(Value::Int(n as i64))),
            None => FilterValue::Nothing,
        }
    }
}

struct Count;

impl FunctionExtension for Count {
    fn arg_types(&self) -> &'static [ExpressionType] {
        &[ExpressionType::Nodes]
    }

    fn return_type(&self) -> ExpressionType {
        ExpressionType::Value
    }

    fn call<'v>(&self, mut args: Vec<FilterValue<'v>>) -> FilterValue<'v> {
        match args.pop() {
            Some(FilterValue::Nodes(nodes)) => {
                FilterValue::Value(Cow::Owned(Value::Int(nodes.len() as i64)))
            }
            _ => FilterValue::Nothing,
        }
    }
}

struct ValueOf;

impl FunctionExtension for ValueOf {
    fn arg_types(&self) -> &'static [ExpressionType] {
        &[ExpressionType::Nodes]
    }

    fn return_type(&self) -> ExpressionType {
        ExpressionType::Value
    }

    fn call<'v>(&self, mut args: Vec<FilterValue<'v>>) -> FilterValue<'v> {
        match args.pop().and_then(FilterValue::into_value) {
            Some(value) => FilterValue::Value(value),
            None => FilterValue::Nothing,
        }
    }
}

/// `match` when `full` is true, `search` otherwise
struct RegexMatch {
    full: bool,
}

impl FunctionExtension for RegexMatch {
    fn arg_types(&self) -> &'static [ExpressionType] {
        &[ExpressionType::Value, ExpressionType::Value]
    }

    fn return_type(&self) -> ExpressionType {
        ExpressionType::Logical
    }

    fn call<'v>(&self, args: Vec<FilterValue<'v>>) -> FilterValue<'v> {
        let mut args = args.into_iter().map(FilterValue::into_value);
        let (subject, pattern) = match (args.next().flatten(), args.next().flatten()) {
            (Some(s), Some(p)) => (s, p),
            _ => return FilterValue::Logical(false),
        };
        let (subject, pattern) = match (subject.as_str(), pattern.as_str()) {
            (Some(s), Some(p)) => (s.to_string(), p.to_string()),
            _ => return FilterValue::Logical(false),
        };

        FilterValue::Logical(
            cached_regex(&pattern, self.full)
                .map(|re| re.is_match(&subject))
                .unwrap_or(false),
        )
    }
}

/// Compiled patterns kept before the regex cache starts over
const REGEX_CACHE_CAPACITY: usize = 128;

lazy_static! {
    static ref FUNCTIONS: HashMap<&'static str, Box<dyn FunctionExtension>> = {
        let mut m: HashMap<&'static str, Box<dyn FunctionExtension>> = HashMap::new();
        m.insert("length", Box::new(Length));
        m.insert("count", Box::new(Count));
        m.insert("match", Box::new(RegexMatch { full: true }));
        m.insert("search", Box::new(RegexMatch { full: false }));
        m.insert("value", Box::new(ValueOf));
        m
    };
    static ref REGEX_CACHE: Mutex<HashMap<(String, bool), Option<Regex>>> =
        Mutex::new(HashMap::new());
}

/// Look up a function extension by name
pub fn function_extension(name: &str) -> Option<&'static dyn FunctionExtension> {
    FUNCTIONS.get(name).map(|f| f.as_ref())
}

fn cached_regex(pattern: &str, full: bool) -> Option<Regex> {
    let key = (pattern.to_string(), full);
    if let Ok(cache) = REGEX_CACHE.lock() {
        if let Some(re) = cache.get(&key) {
            return re.clone();
        }
    }

    let translated = translate_iregexp(pattern);
    let source = if full {
        format!("^(?:{})$", translated)
    } else {
        translated
    };
    let re = Regex::new(&source).ok();

    if let Ok(mut cache) = REGEX_CACHE.lock() {
        if cache.len() >= REGEX_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(key, re.clone());
    }
    re
}

/// I-Regexp `.` matches any character except line breaks
fn translate_iregexp(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    let mut in_class = false;

    for c in pattern.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '[' => {
                in_class = true;
                out.push(c);
            }
            ']' => {
                in_class = false;
                out.push(c);
            }
            '.' if !in_class => out.push_str("(?:[^\\n\\r])"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> FilterValue<'static> {
        FilterValue::Value(Cow::Owned(Value::from(s)))
    }

    #[test]
    fn test_length() {
        let f = function_extension("length").unwrap();
        assert!(matches!(
            f.call(vec![string("héllo")]),
            FilterValue::Value(v) if v.as_ref() == &Value::Int(5)
        ));
        assert!(matches!(
            f.call(vec![FilterValue::Value(Cow::Owned(Value::Int(1)))]),
            FilterValue::Nothing
        ));
    }

    #[test]
    fn test_match_is_anchored_and_search_is_not() {
        let m = function_extension("match").unwrap();
        let s = function_extension("search").unwrap();
        assert!(m.call(vec![string("abc"), string("a.c")]).is_truthy());
        assert!(!m.call(vec![string("xabc"), string("a.c")]).is_truthy());
        assert!(s.call(vec![string("xabc"), string("a.c")]).is_truthy());
        assert!(!m.call(vec![string("a\nc"), string("a.c")]).is_truthy());
        assert!(!m.call(vec![string("abc"), string("(")]).is_truthy());
    }

    #[test]
    fn test_regex_cache_is_bounded() {
        for i in 0..REGEX_CACHE_CAPACITY * 3 {
            assert!(cached_regex(&format!("p{}", i), i % 2 == 0).is_some());
        }
        assert!(REGEX_CACHE.lock().unwrap().len() <= REGEX_CACHE_CAPACITY);
        assert!(cached_regex("(", true).is_none());
    }

    #[test]
    fn test_unknown_function() {
        assert!(function_extension("nosuchthing").is_none());
        assert_eq!(
            function_extension("count").unwrap().return_type(),
            ExpressionType::Value
        );
    }

    #[test]
    fn test_translate_iregexp() {
        assert_eq!(translate_iregexp("a.b"), "a(?:[^\\n\\r])b");
        assert_eq!(translate_iregexp("[.]\\."), "[.]\\.");
    }
}
