//! Filter functions
//!
//! Filters are plain functions registered with an
//! [`Environment`](crate::environment::Environment) by name. Each one takes
//! the value to the left of the pipe and its evaluated arguments.

mod date;
mod html;
mod list;
mod math;
mod misc;
mod string;
mod url;

use std::collections::HashMap;

use thiserror::Error;

use crate::context::RenderContext;
use crate::environment::Environment;
use crate::error::LiquidError;
use crate::value::{range_items, Value};

pub use date::*;
pub use html::*;
pub use list::*;
pub use math::*;
pub use misc::*;
pub use string::*;
pub use url::*;

/// Failure inside a filter function
#[derive(Error, Debug)]
pub enum FilterError {
    /// A bad argument, or a left value the filter can not use
    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Liquid(#[from] LiquidError),
}

impl FilterError {
    pub fn argument(message: impl Into<String>) -> Self {
        FilterError::Argument(message.into())
    }
}

pub type FilterResult = Result<Value, FilterError>;

/// A registered filter
#[derive(Debug, Clone, Copy)]
pub enum FilterFunction {
    Plain(fn(&Value, &FilterArgs) -> FilterResult),
    /// Also receives the active render context
    WithContext(fn(&Value, &FilterArgs, &RenderContext) -> FilterResult),
    /// Also receives the environment the template belongs to
    WithEnvironment(fn(&Value, &FilterArgs, &Environment) -> FilterResult),
}

impl FilterFunction {
    pub fn call(&self, left: &Value, args: &FilterArgs, context: &RenderContext) -> FilterResult {
        match self {
            FilterFunction::Plain(f) => f(left, args),
            FilterFunction::WithContext(f) => f(left, args, context),
            FilterFunction::WithEnvironment(f) => f(left, args, &context.env),
        }
    }
}

/// Evaluated filter arguments
#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl FilterArgs {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// The last keyword argument called `name`
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// A keyword argument, falling back to a positional one
    pub fn named(&self, name: &str, index: usize) -> Option<&Value> {
        self.keyword(name).or_else(|| self.get(index))
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&Value, FilterError> {
        self.named(name, index)
            .ok_or_else(|| FilterError::argument(format!("missing required argument '{}'", name)))
    }

    pub fn expect_at_most(&self, count: usize) -> Result<(), FilterError> {
        if self.positional.len() > count {
            return Err(FilterError::argument(format!(
                "expected at most {} positional argument{}, found {}",
                count,
                if count == 1 { "" } else { "s" },
                self.positional.len()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Argument coercion
// ============================================================================

/// The string form of a filter's left value or argument
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Undefined(_) => String::new(),
        other => other.to_string(),
    }
}

/// Coerce an argument to an integer
pub fn int_arg(value: &Value) -> Result<i64, FilterError> {
    value.as_int().ok_or_else(|| {
        FilterError::argument(format!("expected an int or string, found {}", value.type_name()))
    })
}

/// Coerce an argument to an integer, or `default` if it can not be
pub fn int_arg_or(value: Option<&Value>, default: i64) -> i64 {
    value.and_then(Value::as_int).unwrap_or(default)
}

/// Coerce a value to a sequence
///
/// Arrays are flattened, ranges expanded and anything else becomes a
/// sequence of one item.
pub fn sequence(value: &Value) -> Result<Vec<Value>, FilterError> {
    Ok(match value {
        Value::Array(items) => flatten(items, 5),
        Value::Range(start, stop) => range_items(*start, *stop)?,
        Value::Undefined(_) => Vec::new(),
        other => vec![other.clone()],
    })
}

fn flatten(items: &[Value], level: usize) -> Vec<Value> {
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) if level > 0 => flat.extend(flatten(inner, level - 1)),
            other => flat.push(other.clone()),
        }
    }
    flat
}

// ============================================================================
// Registry
// ============================================================================

/// Every built in filter, by name
pub fn standard_filters() -> HashMap<String, FilterFunction> {
    use FilterFunction::{Plain, WithEnvironment};

    let filters: Vec<(&str, FilterFunction)> = vec![
        ("abs", Plain(abs)),
        ("append", Plain(append)),
        ("at_least", Plain(at_least)),
        ("at_most", Plain(at_most)),
        ("capitalize", Plain(capitalize)),
        ("ceil", Plain(ceil)),
        ("compact", Plain(compact)),
        ("concat", Plain(concat)),
        ("date", Plain(date)),
        ("default", Plain(default)),
        ("divided_by", Plain(divided_by)),
        ("downcase", Plain(downcase)),
        ("escape", Plain(escape)),
        ("escape_once", Plain(escape_once)),
        ("first", Plain(first)),
        ("floor", Plain(floor)),
        ("join", WithEnvironment(join)),
        ("json", Plain(json)),
        ("last", Plain(last)),
        ("lstrip", Plain(lstrip)),
        ("map", Plain(map)),
        ("minus", Plain(minus)),
        ("modulo", Plain(modulo)),
        ("newline_to_br", Plain(newline_to_br)),
        ("plus", Plain(plus)),
        ("prepend", Plain(prepend)),
        ("remove", Plain(remove)),
        ("remove_first", Plain(remove_first)),
        ("replace", Plain(replace)),
        ("replace_first", Plain(replace_first)),
        ("reverse", Plain(reverse)),
        ("round", Plain(round)),
        ("rstrip", Plain(rstrip)),
        ("size", Plain(size)),
        ("slice", Plain(slice)),
        ("sort", Plain(sort)),
        ("split", Plain(split)),
        ("strip", Plain(strip)),
        ("strip_html", Plain(strip_html)),
        ("strip_newlines", Plain(strip_newlines)),
        ("times", Plain(times)),
        ("truncate", Plain(truncate)),
        ("truncatewords", Plain(truncatewords)),
        ("uniq", Plain(uniq)),
        ("upcase", Plain(upcase)),
        ("url_decode", Plain(url_decode)),
        ("url_encode", Plain(url_encode)),
        ("where", Plain(where_)),
    ];

    filters
        .into_iter()
        .map(|(name, function)| (name.to_string(), function))
        .collect()
}
