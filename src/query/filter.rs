//! Filter selector expressions, like `?@.price < 10 && @.in_stock`

use std::borrow::Cow;
use std::fmt;

use super::functions::{function_extension, ExpressionType, FilterValue};
use super::node::QueryNode;
use super::{Candidate, Query, Resolver};
use crate::error::LiquidError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    True,
    False,
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Not(Box<FilterExpression>),
    Logical {
        left: Box<FilterExpression>,
        operator: LogicalOperator,
        right: Box<FilterExpression>,
    },
    Comparison {
        left: Box<FilterExpression>,
        operator: ComparisonOperator,
        right: Box<FilterExpression>,
    },
    /// A query starting at the current node, `@`
    RelativeQuery(Box<Query>),
    /// A query starting at the root, `$`
    RootQuery(Box<Query>),
    Function {
        name: String,
        args: Vec<FilterExpression>,
    },
}

impl FilterExpression {
    pub(crate) fn is_satisfied<'v>(
        &self,
        resolver: &Resolver<'v>,
        current: &QueryNode<'v>,
    ) -> Result<bool, LiquidError> {
        Ok(self.evaluate(resolver, current)?.is_truthy())
    }

    fn evaluate<'v>(
        &self,
        resolver: &Resolver<'v>,
        current: &QueryNode<'v>,
    ) -> Result<FilterValue<'v>, LiquidError> {
        let literal = |v: Value| Ok(FilterValue::Value(Cow::Owned(v)));
        match self {
            FilterExpression::True => literal(Value::Bool(true)),
            FilterExpression::False => literal(Value::Bool(false)),
            FilterExpression::Null => literal(Value::Nil),
            FilterExpression::String(s) => literal(Value::String(s.clone())),
            FilterExpression::Int(i) => literal(Value::Int(*i)),
            FilterExpression::Float(f) => literal(Value::Float(*f)),
            FilterExpression::Not(expression) => Ok(FilterValue::Logical(
                !expression.evaluate(resolver, current)?.is_truthy(),
            )),
            FilterExpression::Logical {
                left,
                operator,
                right,
            } => {
                let left = left.evaluate(resolver, current)?.is_truthy();
                let result = match operator {
                    LogicalOperator::And => left && right.evaluate(resolver, current)?.is_truthy(),
                    LogicalOperator::Or => left || right.evaluate(resolver, current)?.is_truthy(),
                };
                Ok(FilterValue::Logical(result))
            }
            FilterExpression::Comparison {
                left,
                operator,
                right,
            } => {
                let left = left.evaluate(resolver, current)?.into_value();
                let right = right.evaluate(resolver, current)?.into_value();
                Ok(FilterValue::Logical(compare(
                    left.as_deref(),
                    *operator,
                    right.as_deref(),
                )))
            }
            FilterExpression::RelativeQuery(query) => Ok(FilterValue::Nodes(
                query.resolve_from(Candidate::Node(current.clone()), resolver)?,
            )),
            FilterExpression::RootQuery(query) => Ok(FilterValue::Nodes(
                query.resolve_from(resolver.root_candidate(), resolver)?,
            )),
            FilterExpression::Function { name, args } => {
                // Names are checked when the query is parsed
                let func = match function_extension(name) {
                    Some(func) => func,
                    None => return Ok(FilterValue::Nothing),
                };

                let mut values = Vec::with_capacity(args.len());
                for (arg, ty) in args.iter().zip(func.arg_types()) {
                    let value = arg.evaluate(resolver, current)?;
                    values.push(match ty {
                        ExpressionType::Value => match value.into_value() {
                            Some(v) => FilterValue::Value(v),
                            None => FilterValue::Nothing,
                        },
                        ExpressionType::Logical => FilterValue::Logical(value.is_truthy()),
                        ExpressionType::Nodes => value,
                    });
                }
                Ok(func.call(values))
            }
        }
    }
}

fn compare(left: Option<&Value>, operator: ComparisonOperator, right: Option<&Value>) -> bool {
    match operator {
        ComparisonOperator::Eq => equal(left, right),
        ComparisonOperator::Ne => !equal(left, right),
        ComparisonOperator::Lt => less_than(left, right),
        ComparisonOperator::Gt => less_than(right, left),
        ComparisonOperator::Le => less_than(left, right) || equal(left, right),
        ComparisonOperator::Ge => less_than(right, left) || equal(left, right),
    }
}

fn equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(a), Some(b)) => json_eq(a, b),
        _ => false,
    }
}

fn less_than(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => match (a.as_f64_strict(), b.as_f64_strict()) {
            (Some(x), Some(y)) => x < y,
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x < y,
                _ => false,
            },
        },
        _ => false,
    }
}

/// Deep equality where ints and floats compare numerically and object key
/// order does not matter
pub(crate) fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_eq(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| json_eq(v, w)).unwrap_or(false))
        }
        _ => match (a.as_f64_strict(), b.as_f64_strict()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        },
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::True => f.write_str("true"),
            FilterExpression::False => f.write_str("false"),
            FilterExpression::Null => f.write_str("null"),
            FilterExpression::String(s) => write!(f, "{:?}", s),
            FilterExpression::Int(i) => write!(f, "{}", i),
            FilterExpression::Float(x) => write!(f, "{:?}", x),
            FilterExpression::Not(e) => write!(f, "!{}", e),
            FilterExpression::Logical {
                left,
                operator,
                right,
            } => {
                let op = match operator {
                    LogicalOperator::And => "&&",
                    LogicalOperator::Or => "||",
                };
                write!(f, "({} {} {})", left, op, right)
            }
            FilterExpression::Comparison {
                left,
                operator,
                right,
            } => {
                let op = match operator {
                    ComparisonOperator::Eq => "==",
                    ComparisonOperator::Ne => "!=",
                    ComparisonOperator::Ge => ">=",
                    ComparisonOperator::Gt => ">",
                    ComparisonOperator::Le => "<=",
                    ComparisonOperator::Lt => "<",
                };
                write!(f, "{} {} {}", left, op, right)
            }
            FilterExpression::RelativeQuery(q) => write!(f, "@{}", RelativeDisplay(q)),
            FilterExpression::RootQuery(q) => write!(f, "${}", RelativeDisplay(q)),
            FilterExpression::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Segments written in bracket notation, as they follow `@` or `$`
struct RelativeDisplay<'a>(&'a Query);

impl fmt::Display for RelativeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0.segments {
            if let super::Segment::Recursive { .. } = segment {
                f.write_str("..")?;
            }
            f.write_str("[")?;
            for (i, selector) in segment.selectors().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", selector)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_comparisons() {
        assert!(compare(None, ComparisonOperator::Eq, None));
        assert!(!compare(None, ComparisonOperator::Eq, Some(&Value::Nil)));
        assert!(compare(None, ComparisonOperator::Le, None));
        assert!(!compare(None, ComparisonOperator::Lt, Some(&Value::Int(1))));
    }

    #[test]
    fn test_mixed_numbers_and_strings() {
        assert!(compare(Some(&Value::Int(1)), ComparisonOperator::Eq, Some(&Value::Float(1.0))));
        assert!(compare(Some(&Value::Int(1)), ComparisonOperator::Lt, Some(&Value::Float(1.5))));
        assert!(compare(Some(&Value::from("a")), ComparisonOperator::Lt, Some(&Value::from("b"))));
        assert!(!compare(Some(&Value::from("1")), ComparisonOperator::Lt, Some(&Value::Int(2))));
        assert!(!compare(Some(&Value::Bool(true)), ComparisonOperator::Gt, Some(&Value::Bool(false))));
    }

    #[test]
    fn test_deep_equality_ignores_key_order() {
        let a = Value::from_json(&serde_json::json!({"x": 1, "y": [1, 2.0]}));
        let b = Value::from_json(&serde_json::json!({"y": [1.0, 2], "x": 1}));
        assert!(json_eq(&a, &b));
    }
}
