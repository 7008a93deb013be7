//! Expressions
//!
//! Everything between `{{ }}` and the arguments of most tags parse to an
//! [`Expression`]. Evaluation always happens against a [`RenderContext`],
//! which resolves queries and looks up filters.

mod filter;
mod looping;
pub mod ops;
mod parser;

use std::fmt;

use crate::context::RenderContext;
use crate::error::{LiquidError, Span};
use crate::query::Query;
use crate::value::Value;

pub use filter::{Filter, FilterArgument};
pub use looping::{LoopExpression, LoopItems};
pub use parser::{
    parse_boolean, parse_filtered, parse_identifier, parse_keyword_arguments, parse_primitive,
    parse_string_or_identifier, PRECEDENCE_AND, PRECEDENCE_LOWEST,
    PRECEDENCE_MEMBERSHIP, PRECEDENCE_OR, PRECEDENCE_PREFIX, PRECEDENCE_RELATIONAL,
};

// ============================================================================
// Expression
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    In,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Contains => "contains",
            BinaryOperator::In => "in",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Null,
    Empty,
    Blank,
    /// `continue` as a loop offset
    Continue,
    Literal(Literal),
    Range {
        start: Box<Expression>,
        stop: Box<Expression>,
    },
    Query {
        query: Query,
        span: Span,
    },
    Filtered(Box<FilteredExpression>),
    Ternary(Box<TernaryExpression>),
    /// Coerce the inner expression to `true` or `false`
    Boolean(Box<Expression>),
    Not(Box<Expression>),
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Loop(Box<LoopExpression>),
}

/// `left | filter | filter`
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredExpression {
    pub left: Expression,
    pub filters: Vec<Filter>,
}

/// `left if condition else alternative | filter || tail_filter`
#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpression {
    pub left: FilteredExpression,
    pub condition: Expression,
    pub alternative: Option<Expression>,
    pub filters: Vec<Filter>,
    pub tail_filters: Vec<Filter>,
}

impl Expression {
    pub fn evaluate(&self, context: &mut RenderContext) -> Result<Value, LiquidError> {
        match self {
            Expression::Null => Ok(Value::Nil),
            Expression::Empty => Ok(Value::Empty),
            Expression::Blank => Ok(Value::Blank),
            Expression::Continue => Ok(Value::Int(0)),
            Expression::Literal(literal) => Ok(match literal {
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::String(s) if context.auto_escape() => Value::Markup(s.clone()),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expression::Range { start, stop } => {
                let start = start.evaluate(context)?;
                let stop = stop.evaluate(context)?;
                Ok(ops::make_range(&start, &stop))
            }
            Expression::Query { query, span } => context.get(query, *span),
            Expression::Filtered(expr) => expr.evaluate(context),
            Expression::Ternary(expr) => expr.evaluate(context),
            Expression::Boolean(inner) => Ok(Value::Bool(inner.evaluate(context)?.is_truthy()?)),
            Expression::Not(inner) => Ok(Value::Bool(!inner.evaluate(context)?.is_truthy()?)),
            Expression::Binary {
                operator,
                left,
                right,
                span,
            } => evaluate_binary(*operator, left, right, *span, context),
            Expression::Loop(_) => Err(LiquidError::type_error(
                "a loop expression can only be used by a 'for' tag",
                self.span().unwrap_or_default(),
            )),
        }
    }

    /// Same as [`Expression::evaluate`], for async render paths
    pub async fn evaluate_async(&self, context: &mut RenderContext) -> Result<Value, LiquidError> {
        self.evaluate(context)
    }

    /// Evaluate as a condition
    pub fn is_satisfied(&self, context: &mut RenderContext) -> Result<bool, LiquidError> {
        self.evaluate(context)?.is_truthy()
    }

    /// Best available source location
    pub fn span(&self) -> Option<Span> {
        match self {
            Expression::Query { span, .. } | Expression::Binary { span, .. } => Some(*span),
            Expression::Range { start, stop } => match (start.span(), stop.span()) {
                (Some(a), Some(b)) => Some(a.join(b)),
                (a, b) => a.or(b),
            },
            Expression::Filtered(expr) => expr.left.span(),
            Expression::Ternary(expr) => expr.left.left.span(),
            Expression::Boolean(inner) | Expression::Not(inner) => inner.span(),
            Expression::Loop(expr) => Some(expr.span),
            _ => None,
        }
    }

    /// Immediate sub-expressions, for tools that walk a template
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Range { start, stop } => vec![start.as_ref(), stop.as_ref()],
            Expression::Filtered(expr) => expr.children(),
            Expression::Ternary(expr) => {
                let mut children = expr.left.children();
                children.push(&expr.condition);
                children.extend(expr.alternative.iter());
                for filter in expr.filters.iter().chain(&expr.tail_filters) {
                    children.extend(filter.children());
                }
                children
            }
            Expression::Boolean(inner) | Expression::Not(inner) => vec![inner.as_ref()],
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Loop(expr) => expr.children(),
            _ => Vec::new(),
        }
    }
}

fn evaluate_binary(
    operator: BinaryOperator,
    left: &Expression,
    right: &Expression,
    span: Span,
    context: &mut RenderContext,
) -> Result<Value, LiquidError> {
    let result = match operator {
        BinaryOperator::And => {
            left.evaluate(context)?.is_truthy()? && right.evaluate(context)?.is_truthy()?
        }
        BinaryOperator::Or => {
            left.evaluate(context)?.is_truthy()? || right.evaluate(context)?.is_truthy()?
        }
        _ => {
            let l = left.evaluate(context)?;
            let r = right.evaluate(context)?;
            compare(operator, &l, &r, span)?
        }
    };
    Ok(Value::Bool(result))
}

fn compare(operator: BinaryOperator, l: &Value, r: &Value, span: Span) -> Result<bool, LiquidError> {
    match operator {
        BinaryOperator::Ne => Ok(!ops::eq(l, r)?),
        BinaryOperator::Lt => ops::lt(l, r, span),
        BinaryOperator::Gt => ops::lt(r, l, span),
        BinaryOperator::Le => Ok(ops::eq(l, r)? || ops::lt(l, r, span)?),
        BinaryOperator::Ge => Ok(ops::eq(l, r)? || ops::lt(r, l, span)?),
        BinaryOperator::Contains => ops::contains(l, r, span),
        BinaryOperator::In => ops::contains(r, l, span),
        BinaryOperator::Eq | BinaryOperator::And | BinaryOperator::Or => ops::eq(l, r),
    }
}

impl FilteredExpression {
    pub fn evaluate(&self, context: &mut RenderContext) -> Result<Value, LiquidError> {
        let mut value = self.left.evaluate(context)?;
        for filter in &self.filters {
            value = filter.apply(value, context)?;
        }
        Ok(value)
    }

    fn children(&self) -> Vec<&Expression> {
        let mut children = vec![&self.left];
        for filter in &self.filters {
            children.extend(filter.children());
        }
        children
    }
}

impl TernaryExpression {
    pub fn evaluate(&self, context: &mut RenderContext) -> Result<Value, LiquidError> {
        let mut value = if self.condition.is_satisfied(context)? {
            self.left.evaluate(context)?
        } else if let Some(alternative) = &self.alternative {
            let mut value = alternative.evaluate(context)?;
            for filter in &self.filters {
                value = filter.apply(value, context)?;
            }
            value
        } else {
            Value::Nil
        };

        for filter in &self.tail_filters {
            value = filter.apply(value, context)?;
        }
        Ok(value)
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "'{}'", s),
        }
    }
}

fn write_filters(f: &mut fmt::Formatter<'_>, filters: &[Filter], delim: &str) -> fmt::Result {
    for filter in filters {
        write!(f, " {} {}", delim, filter)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Null => f.write_str("nil"),
            Expression::Empty => f.write_str("empty"),
            Expression::Blank => f.write_str("blank"),
            Expression::Continue => f.write_str("continue"),
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Range { start, stop } => write!(f, "({}..{})", start, stop),
            Expression::Query { query, .. } => write!(f, "{}", query),
            Expression::Filtered(expr) => {
                write!(f, "{}", expr.left)?;
                write_filters(f, &expr.filters, "|")
            }
            Expression::Ternary(expr) => {
                write!(f, "{}", expr.left.left)?;
                write_filters(f, &expr.left.filters, "|")?;
                write!(f, " if {}", expr.condition)?;
                if let Some(alternative) = &expr.alternative {
                    write!(f, " else {}", alternative)?;
                    write_filters(f, &expr.filters, "|")?;
                }
                write_filters(f, &expr.tail_filters, "||")
            }
            Expression::Boolean(inner) => write!(f, "{}", inner),
            Expression::Not(inner) => write!(f, "not {}", inner),
            Expression::Binary {
                operator,
                left,
                right,
                ..
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::Loop(expr) => write!(f, "{}", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::lexer::tokenize_expression;
    use crate::lexer::TokenStream;
    use serde_json::json;
    use std::sync::Arc;

    fn eval(source: &str, data: serde_json::Value) -> Result<Value, LiquidError> {
        let env = Arc::new(Environment::new());
        let tokens = tokenize_expression(source)?;
        let mut stream = TokenStream::new(&tokens);
        let expr = parse_boolean(&mut stream)?;
        stream.expect_eoi()?;
        let mut context = RenderContext::for_test(&env, data);
        expr.evaluate(&mut context)
    }

    fn eval_filtered(source: &str, data: serde_json::Value) -> Result<Value, LiquidError> {
        let env = Arc::new(Environment::new());
        let tokens = tokenize_expression(source)?;
        let mut stream = TokenStream::new(&tokens);
        let expr = parse_filtered(&mut stream)?;
        stream.expect_eoi()?;
        let mut context = RenderContext::for_test(&env, data);
        expr.evaluate(&mut context)
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("1 < 2", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(eval("2 <= 2 and 'b' > 'a'", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(eval("x == 1 or y", json!({"x": 2, "y": false})).unwrap(), Value::Bool(false));
        assert_eq!(eval("not x", json!({"x": null})).unwrap(), Value::Bool(true));
        assert_eq!(eval("(true and false) or true", json!({})).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_bool_is_not_an_int() {
        assert_eq!(eval("1 == true", json!({})).unwrap(), Value::Bool(false));
        assert_eq!(eval("true < 1", json!({})).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_empty_and_blank() {
        let data = json!({"s": "", "ws": "  ", "a": [], "o": {}, "x": "x"});
        assert_eq!(eval("s == blank", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("ws == blank", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("x == blank", data.clone()).unwrap(), Value::Bool(false));
        assert_eq!(eval("a == empty", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("empty == o", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("ws == empty", data).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_membership() {
        let data = json!({"tags": ["a", "b"], "user": {"name": "x"}, "title": "hello 42"});
        assert_eq!(eval("tags contains 'a'", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("'c' in tags", data.clone()).unwrap(), Value::Bool(false));
        assert_eq!(eval("user contains 'name'", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("title contains 42", data.clone()).unwrap(), Value::Bool(true));
        assert_eq!(eval("3 in (1..5)", data).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ordering_type_error() {
        let err = eval("x < 1", json!({"x": [1]})).unwrap_err();
        assert!(matches!(err, LiquidError::Type(_)));
        assert!(err.to_string().contains("'<' and '>'"));
    }

    #[test]
    fn test_lt_and_gt_agree() {
        assert_eq!(eval("1 > 2", json!({})).unwrap(), Value::Bool(false));
        assert_eq!(eval("2 > 1", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(eval("2 < 1", json!({})).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(eval_filtered("(1..3)", json!({})).unwrap(), Value::Range(1, 3));
        assert_eq!(eval_filtered("(5..1)", json!({})).unwrap().size(), Some(0));
        assert_eq!(
            eval_filtered("(a..'4')", json!({"a": "x"})).unwrap(),
            Value::Range(0, 4)
        );
        assert_eq!(
            eval_filtered("(1..n) | size", json!({"n": 2.7})).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_ternary() {
        let data = json!({"user": {"name": "bob", "admin": false}});
        assert_eq!(
            eval_filtered("user.name | upcase if user.admin else 'guest'", data.clone()).unwrap(),
            Value::from("guest")
        );
        assert_eq!(
            eval_filtered("'x' if user.admin", data.clone()).unwrap(),
            Value::Nil
        );
        assert_eq!(
            eval_filtered(
                "user.name if user.admin else 'guest' | append: '!' || upcase",
                data
            )
            .unwrap(),
            Value::from("GUEST!")
        );
    }

    #[test]
    fn test_filter_arguments() {
        assert_eq!(
            eval_filtered("'a,b' | split: ',' | join: '-'", json!({})).unwrap(),
            Value::from("a-b")
        );
        assert_eq!(
            eval_filtered("x | default: 'y', allow_false: true", json!({"x": false})).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_unknown_filter_is_name_error() {
        let err = eval_filtered("'a' | nosuchthing", json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Name(_)));
    }

    #[test]
    fn test_display() {
        let tokens = tokenize_expression("a.b | append: 'c' if x else y").unwrap();
        let mut stream = TokenStream::new(&tokens);
        let expr = parse_filtered(&mut stream).unwrap();
        assert_eq!(expr.to_string(), "a.b | append: 'c' if x else y");
    }
}
