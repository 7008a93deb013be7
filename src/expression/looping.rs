//! `item in items limit: 2 offset: continue reversed`

use std::fmt;

use crate::context::RenderContext;
use crate::error::{LiquidError, Span};
use crate::lexer::{TokenKind, TokenStream};
use crate::value::{range_len, Value};

use super::parser::{parse_identifier, parse_primitive};
use super::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopExpression {
    pub identifier: String,
    pub iterable: Expression,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub reversed: bool,
    pub cols: Option<Expression>,
    pub span: Span,
}

impl LoopExpression {
    pub fn parse(stream: &mut TokenStream) -> Result<Self, LiquidError> {
        let span = stream.span();
        let (identifier, _) = parse_identifier(&stream.next_token())?;
        stream.expect(&TokenKind::In)?;
        let iterable = parse_primitive(&stream.next_token())?;

        let mut limit = None;
        let mut offset = None;
        let mut cols = None;
        let mut reversed = false;

        loop {
            let token = stream.next_token();
            match &token.kind {
                TokenKind::Word(w) => match w.as_str() {
                    "reversed" => reversed = true,
                    "limit" | "offset" | "cols" => {
                        if !stream.eat(&TokenKind::Colon) && !stream.eat(&TokenKind::Assign) {
                            return Err(stream.unexpected("expected ':' or '='"));
                        }
                        let value_token = stream.next_token();
                        let value = match &value_token.kind {
                            TokenKind::Word(v) if w == "offset" && v == "continue" => {
                                Expression::Continue
                            }
                            _ => parse_primitive(&value_token)?,
                        };
                        match w.as_str() {
                            "limit" => limit = Some(value),
                            "offset" => offset = Some(value),
                            _ => cols = Some(value),
                        }
                    }
                    other => {
                        return Err(LiquidError::syntax(
                            format!("expected 'reversed', 'offset' or 'limit', found '{}'", other),
                            token.span,
                        ))
                    }
                },
                TokenKind::Comma => continue,
                TokenKind::Eoi => break,
                other => {
                    return Err(LiquidError::syntax(
                        format!("expected 'reversed', 'offset' or 'limit', found '{}'", other),
                        token.span,
                    ))
                }
            }
        }

        Ok(Self {
            identifier,
            iterable,
            limit,
            offset,
            reversed,
            cols,
            span: span.join(stream.span()),
        })
    }

    /// Key under which `offset: continue` finds where this loop stopped
    pub fn stop_index_key(&self) -> String {
        format!("{}-{}", self.identifier, self.iterable)
    }

    /// Items to iterate over after applying `offset`, `limit` and `reversed`
    pub fn evaluate(&self, context: &mut RenderContext) -> Result<LoopItems, LiquidError> {
        let items = self.to_items(self.iterable.evaluate(context)?)?;
        let limit = self.eval_int(self.limit.as_ref(), context)?;
        if let Some(cols) = &self.cols {
            self.eval_int(Some(cols), context)?;
        }

        let offset = match &self.offset {
            Some(Expression::Continue) => Some(context.take_stop_index(&self.stop_index_key())),
            other => self.eval_int(other.as_ref(), context)?,
        };

        let (offset, count) = self.window(context, items.len(), limit, offset);
        let mut items = items.slice(offset, count);
        if self.reversed {
            items.reverse();
        }
        Ok(items)
    }

    pub async fn evaluate_async(
        &self,
        context: &mut RenderContext,
    ) -> Result<LoopItems, LiquidError> {
        self.evaluate(context)
    }

    /// Offset and count of the items to visit, recording where the loop stops
    fn window(
        &self,
        context: &mut RenderContext,
        length: usize,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> (usize, usize) {
        let key = self.stop_index_key();

        if limit.is_none() && offset.is_none() {
            context.set_stop_index(key, length);
            return (0, length);
        }

        let offset = offset.unwrap_or(0);
        let mut count = length.saturating_sub(offset);
        if let Some(limit) = limit {
            count = count.min(limit);
        }

        context.set_stop_index(key, offset.saturating_add(count));
        (offset, count)
    }

    fn to_items(&self, value: Value) -> Result<LoopItems, LiquidError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                .collect(),
            Value::Range(start, stop) => {
                return Ok(LoopItems::Range {
                    start,
                    len: range_len(start, stop),
                    reversed: false,
                })
            }
            Value::String(_) | Value::Markup(_) => vec![value],
            Value::Nil | Value::Empty | Value::Blank => Vec::new(),
            Value::Undefined(u) => u.check().map(|_| Vec::new())?,
            other => {
                return Err(LiquidError::type_error(
                    format!(
                        "expected an iterable at '{}', found '{}'",
                        self.iterable,
                        other.type_name()
                    ),
                    self.span,
                ))
            }
        };
        Ok(LoopItems::Values(items))
    }

    fn eval_int(
        &self,
        expr: Option<&Expression>,
        context: &mut RenderContext,
    ) -> Result<Option<usize>, LiquidError> {
        let expr = match expr {
            Some(expr) => expr,
            None => return Ok(None),
        };

        let value = expr.evaluate(context)?;
        let int = match &value {
            Value::Int(i) => Some(*i),
            Value::String(s) | Value::Markup(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match int {
            Some(i) => Ok(Some(i.max(0) as usize)),
            None => Err(LiquidError::type_error(
                format!("expected an integer, found '{}'", value.type_name()),
                expr.span().unwrap_or(self.span),
            )),
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        let mut children = vec![&self.iterable];
        children.extend(self.limit.iter());
        children.extend(self.offset.iter());
        children.extend(self.cols.iter());
        children
    }
}

// ============================================================================
// Loop items
// ============================================================================

/// What a `for` loop visits
///
/// Ranges are stepped through rather than expanded, so `(1..1000000000)`
/// with a small `limit` costs nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopItems {
    Values(Vec<Value>),
    /// `len` consecutive integers from `start`, visited from the top when
    /// `reversed`
    Range {
        start: i64,
        len: usize,
        reversed: bool,
    },
}

impl LoopItems {
    pub fn len(&self) -> usize {
        match self {
            LoopItems::Values(items) => items.len(),
            LoopItems::Range { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `count` items starting at `offset`
    fn slice(self, offset: usize, count: usize) -> Self {
        match self {
            LoopItems::Values(items) => {
                LoopItems::Values(items.into_iter().skip(offset).take(count).collect())
            }
            LoopItems::Range {
                start, reversed, ..
            } => LoopItems::Range {
                // Past the end when count is zero, and then unused
                start: i64::try_from(start as i128 + offset as i128).unwrap_or(start),
                len: count,
                reversed,
            },
        }
    }

    fn reverse(&mut self) {
        match self {
            LoopItems::Values(items) => items.reverse(),
            LoopItems::Range { reversed, .. } => *reversed = !*reversed,
        }
    }
}

impl IntoIterator for LoopItems {
    type Item = Value;
    type IntoIter = LoopIter;

    fn into_iter(self) -> LoopIter {
        match self {
            LoopItems::Values(items) => LoopIter::Values(items.into_iter()),
            LoopItems::Range {
                start,
                len,
                reversed,
            } => {
                let (next, step) = if reversed && len > 0 {
                    ((start as i128 + len as i128 - 1) as i64, -1)
                } else {
                    (start, 1)
                };
                LoopIter::Range {
                    next,
                    remaining: len,
                    step,
                }
            }
        }
    }
}

pub enum LoopIter {
    Values(std::vec::IntoIter<Value>),
    Range {
        next: i64,
        remaining: usize,
        step: i64,
    },
}

impl Iterator for LoopIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            LoopIter::Values(items) => items.next(),
            LoopIter::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                // Only step while still inside the range
                if *remaining > 0 {
                    *next += *step;
                }
                Some(Value::Int(value))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            LoopIter::Values(items) => items.size_hint(),
            LoopIter::Range { remaining, .. } => (*remaining, Some(*remaining)),
        }
    }
}

impl fmt::Display for LoopExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.identifier, self.iterable)?;
        if let Some(limit) = &self.limit {
            write!(f, " limit:{}", limit)?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " offset:{}", offset)?;
        }
        if let Some(cols) = &self.cols {
            write!(f, " cols:{}", cols)?;
        }
        if self.reversed {
            f.write_str(" reversed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::lexer::tokenize_expression;
    use serde_json::json;
    use std::sync::Arc;

    fn parse(source: &str) -> LoopExpression {
        let tokens = tokenize_expression(source).unwrap();
        LoopExpression::parse(&mut TokenStream::new(&tokens)).unwrap()
    }

    fn ints(items: LoopItems) -> Vec<i64> {
        items.into_iter().filter_map(|v| v.as_int()).collect()
    }

    #[test]
    fn test_parse_arguments() {
        let expr = parse("item in items limit: 2, offset:continue reversed");
        assert_eq!(expr.identifier, "item");
        assert_eq!(expr.offset, Some(Expression::Continue));
        assert!(expr.reversed);
        assert_eq!(expr.to_string(), "item in items limit:2 offset:continue reversed");
        assert_eq!(expr.stop_index_key(), "item-items");
    }

    #[test]
    fn test_parse_rejects_unknown_argument() {
        let tokens = tokenize_expression("item in items sideways").unwrap();
        let err = LoopExpression::parse(&mut TokenStream::new(&tokens)).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn test_limit_and_continue() {
        let env = Arc::new(Environment::new());
        let data = json!({"items": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]});
        let mut context = RenderContext::for_test(&env, data);

        let first = parse("i in items limit: 3").evaluate(&mut context).unwrap();
        assert_eq!(ints(first), vec![0, 1, 2]);

        let rest = parse("i in items limit: 3 offset: continue")
            .evaluate(&mut context)
            .unwrap();
        assert_eq!(ints(rest), vec![3, 4, 5]);
    }

    #[test]
    fn test_reversed_range() {
        let env = Arc::new(Environment::new());
        let mut context = RenderContext::for_test(&env, json!({}));
        let items = parse("i in (1..5) reversed").evaluate(&mut context).unwrap();
        assert_eq!(ints(items), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_ranges_are_not_expanded() {
        let env = Arc::new(Environment::new());
        let mut context = RenderContext::for_test(&env, json!({}));

        let items = parse("i in (0..9223372036854775806) limit: 2")
            .evaluate(&mut context)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(ints(items), vec![0, 1]);

        let items = parse("i in (1..9223372036854775807) offset: 9223372036854775805 reversed")
            .evaluate(&mut context)
            .unwrap();
        assert_eq!(ints(items), vec![i64::MAX, i64::MAX - 1]);

        let items = parse("i in (-9223372036854775807..-9223372036854775806) reversed")
            .evaluate(&mut context)
            .unwrap();
        assert_eq!(ints(items), vec![i64::MIN + 2, i64::MIN + 1]);

        let items = parse("i in (5..1) offset: 3").evaluate(&mut context).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_objects_iterate_as_pairs() {
        let env = Arc::new(Environment::new());
        let mut context = RenderContext::for_test(&env, json!({"o": {"a": 1}}));
        let items = parse("pair in o").evaluate(&mut context).unwrap();
        assert_eq!(
            items,
            LoopItems::Values(vec![Value::Array(vec![Value::from("a"), Value::Int(1)])])
        );
    }

    #[test]
    fn test_limit_must_be_an_integer() {
        let env = Arc::new(Environment::new());
        let mut context = RenderContext::for_test(&env, json!({"items": [1], "n": [1]}));
        let err = parse("i in items limit: n").evaluate(&mut context).unwrap_err();
        assert!(matches!(err, LiquidError::Type(_)));

        let items = parse("i in items limit: '1'").evaluate(&mut context).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_not_iterable() {
        let env = Arc::new(Environment::new());
        let mut context = RenderContext::for_test(&env, json!({"n": 5}));
        let err = parse("i in n").evaluate(&mut context).unwrap_err();
        assert!(err.to_string().contains("expected an iterable at 'n'"));
    }
}
