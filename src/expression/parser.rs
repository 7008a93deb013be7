//! Expression parsing
//!
//! Filtered expressions are parsed left to right. Boolean expressions, as
//! used by `if`, `unless` and ternaries, use precedence climbing.

use crate::error::{LiquidError, Span};
use crate::lexer::{RangeArgument, Token, TokenKind, TokenStream};
use crate::query::Query;

use super::{
    BinaryOperator, Expression, Filter, FilterArgument, FilteredExpression, Literal,
    TernaryExpression,
};

pub const PRECEDENCE_LOWEST: u8 = 1;
pub const PRECEDENCE_OR: u8 = 3;
pub const PRECEDENCE_AND: u8 = 4;
pub const PRECEDENCE_RELATIONAL: u8 = 5;
pub const PRECEDENCE_MEMBERSHIP: u8 = 6;
pub const PRECEDENCE_PREFIX: u8 = 7;

fn precedence(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Eq
        | TokenKind::Ne
        | TokenKind::Lt
        | TokenKind::Gt
        | TokenKind::Le
        | TokenKind::Ge => PRECEDENCE_RELATIONAL,
        TokenKind::Contains | TokenKind::In => PRECEDENCE_MEMBERSHIP,
        TokenKind::And => PRECEDENCE_AND,
        TokenKind::Or => PRECEDENCE_OR,
        TokenKind::Not => PRECEDENCE_PREFIX,
        _ => PRECEDENCE_LOWEST,
    }
}

fn binary_operator(kind: &TokenKind) -> Option<BinaryOperator> {
    let op = match kind {
        TokenKind::Eq => BinaryOperator::Eq,
        TokenKind::Ne => BinaryOperator::Ne,
        TokenKind::Lt => BinaryOperator::Lt,
        TokenKind::Gt => BinaryOperator::Gt,
        TokenKind::Le => BinaryOperator::Le,
        TokenKind::Ge => BinaryOperator::Ge,
        TokenKind::Contains => BinaryOperator::Contains,
        TokenKind::In => BinaryOperator::In,
        TokenKind::And => BinaryOperator::And,
        TokenKind::Or => BinaryOperator::Or,
        _ => return None,
    };
    Some(op)
}

// ============================================================================
// Primitives
// ============================================================================

fn query_expression(query: Query, span: Span) -> Expression {
    Expression::Query { query, span }
}

fn range_bound(arg: &RangeArgument, span: Span) -> Expression {
    match arg {
        RangeArgument::String(s) => Expression::Literal(Literal::String(s.clone())),
        RangeArgument::Int(i) => Expression::Literal(Literal::Int(*i)),
        RangeArgument::Float(f) => Expression::Literal(Literal::Float(*f)),
        RangeArgument::Query(q) => query_expression(q.clone(), span),
    }
}

/// A literal, range or variable
pub fn parse_primitive(token: &Token) -> Result<Expression, LiquidError> {
    let expr = match &token.kind {
        TokenKind::True => Expression::Literal(Literal::Bool(true)),
        TokenKind::False => Expression::Literal(Literal::Bool(false)),
        TokenKind::Nil => Expression::Null,
        TokenKind::Word(w) if w == "empty" => Expression::Empty,
        TokenKind::Word(w) if w == "blank" => Expression::Blank,
        TokenKind::Word(w) => query_expression(Query::from_name(w), token.span),
        TokenKind::Range(start, stop) => Expression::Range {
            start: Box::new(range_bound(start, token.span)),
            stop: Box::new(range_bound(stop, token.span)),
        },
        TokenKind::String(s) => Expression::Literal(Literal::String(s.clone())),
        TokenKind::Int(i) => Expression::Literal(Literal::Int(*i)),
        TokenKind::Float(f) => Expression::Literal(Literal::Float(*f)),
        TokenKind::Query(q) => query_expression(q.clone(), token.span),
        other => {
            return Err(LiquidError::syntax(
                format!("expected a primitive expression, found '{}'", other),
                token.span,
            ))
        }
    };
    Ok(expr)
}

/// A name that must be a single word, like the target of `assign`
pub fn parse_identifier(token: &Token) -> Result<(String, Span), LiquidError> {
    match &token.kind {
        TokenKind::Word(w) => Ok((w.clone(), token.span)),
        TokenKind::Query(q) => match q.as_word() {
            Some(word) => Ok((word.to_string(), token.span)),
            None => Err(LiquidError::syntax(
                "expected an identifier, found a path",
                token.span,
            )),
        },
        other => Err(LiquidError::syntax(
            format!("expected an identifier, found '{}'", other),
            token.span,
        )),
    }
}

/// A template or block name, quoted or not
pub fn parse_string_or_identifier(token: &Token) -> Result<(String, Span), LiquidError> {
    match &token.kind {
        TokenKind::String(s) => Ok((s.clone(), token.span)),
        _ => parse_identifier(token),
    }
}

// ============================================================================
// Filtered expressions
// ============================================================================

/// `left | filter: args ...`, optionally followed by a ternary `if`
pub fn parse_filtered(stream: &mut TokenStream) -> Result<Expression, LiquidError> {
    let left = parse_primitive(&stream.next_token())?;
    let filters = parse_filters(stream, false)?;
    let left = FilteredExpression { left, filters };

    if matches!(stream.kind(), TokenKind::If) {
        return parse_ternary(left, stream);
    }

    if left.filters.is_empty() {
        Ok(left.left)
    } else {
        Ok(Expression::Filtered(Box::new(left)))
    }
}

fn parse_ternary(
    left: FilteredExpression,
    stream: &mut TokenStream,
) -> Result<Expression, LiquidError> {
    stream.expect(&TokenKind::If)?;
    let condition = parse_boolean(stream)?;
    let mut alternative = None;
    let mut filters = Vec::new();

    if stream.eat(&TokenKind::Else) {
        alternative = Some(parse_primitive(&stream.next_token())?);
        if matches!(stream.kind(), TokenKind::Pipe) {
            filters = parse_filters(stream, false)?;
        }
    }

    let tail_filters = if matches!(stream.kind(), TokenKind::DoublePipe) {
        parse_filters(stream, true)?
    } else {
        Vec::new()
    };

    Ok(Expression::Ternary(Box::new(TernaryExpression {
        left,
        condition,
        alternative,
        filters,
        tail_filters,
    })))
}

/// As many `| name: args` as there are. With `tail` set, `||` also starts a
/// filter.
pub fn parse_filters(stream: &mut TokenStream, tail: bool) -> Result<Vec<Filter>, LiquidError> {
    let mut filters = Vec::new();

    loop {
        match stream.kind() {
            TokenKind::Pipe => {}
            TokenKind::DoublePipe if tail => {}
            _ => break,
        }
        stream.advance();

        let name_token = stream.next_token();
        let name = match &name_token.kind {
            TokenKind::Word(w) => w.clone(),
            other => {
                return Err(LiquidError::syntax(
                    format!("expected a filter name, found '{}'", other),
                    name_token.span,
                ))
            }
        };

        let mut args = Vec::new();
        if stream.eat(&TokenKind::Colon) {
            loop {
                let token = stream.current().clone();
                match &token.kind {
                    TokenKind::Word(w)
                        if matches!(stream.peek().kind, TokenKind::Colon | TokenKind::Assign) =>
                    {
                        stream.advance();
                        stream.advance();
                        let value = parse_primitive(stream.current())?;
                        args.push(FilterArgument::Keyword {
                            name: w.clone(),
                            value,
                        });
                    }
                    TokenKind::Word(_)
                    | TokenKind::Query(_)
                    | TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::String(_)
                    | TokenKind::Range(..)
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Nil => {
                        args.push(FilterArgument::Positional(parse_primitive(&token)?));
                    }
                    // Leading, trailing and repeated commas are allowed
                    TokenKind::Comma => {}
                    _ => break,
                }
                stream.advance();
            }
        }

        filters.push(Filter::new(name, args, name_token.span));
    }

    Ok(filters)
}

// ============================================================================
// Boolean expressions
// ============================================================================

/// A condition, as used by `if` and `unless`
pub fn parse_boolean(stream: &mut TokenStream) -> Result<Expression, LiquidError> {
    let expr = parse_boolean_primitive(stream, PRECEDENCE_LOWEST)?;
    Ok(Expression::Boolean(Box::new(expr)))
}

fn parse_boolean_primitive(
    stream: &mut TokenStream,
    precedence_floor: u8,
) -> Result<Expression, LiquidError> {
    let token = stream.next_token();
    let mut left = match &token.kind {
        TokenKind::Not => {
            let expr = parse_boolean_primitive(stream, PRECEDENCE_LOWEST)?;
            Expression::Not(Box::new(expr))
        }
        TokenKind::LeftParen => parse_grouped(stream)?,
        TokenKind::Eoi => {
            return Err(LiquidError::syntax(
                "expected a primitive expression, found end of expression",
                token.span,
            ))
        }
        _ => parse_primitive(&token)?,
    };

    loop {
        let kind = stream.kind();
        if matches!(kind, TokenKind::Eoi) || precedence(kind) < precedence_floor {
            break;
        }
        if binary_operator(kind).is_none() {
            break;
        }
        left = parse_infix(stream, left)?;
    }

    Ok(left)
}

fn parse_infix(stream: &mut TokenStream, left: Expression) -> Result<Expression, LiquidError> {
    let token = stream.next_token();
    let operator = binary_operator(&token.kind).ok_or_else(|| {
        LiquidError::syntax(
            format!("expected an infix operator, found '{}'", token.kind),
            token.span,
        )
    })?;
    let right = parse_boolean_primitive(stream, precedence(&token.kind))?;
    Ok(Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span: token.span,
    })
}

fn parse_grouped(stream: &mut TokenStream) -> Result<Expression, LiquidError> {
    let mut expr = parse_boolean_primitive(stream, PRECEDENCE_LOWEST)?;

    loop {
        match stream.kind() {
            TokenKind::RightParen => {
                stream.advance();
                return Ok(expr);
            }
            TokenKind::Eoi => {
                return Err(LiquidError::syntax("unbalanced parentheses", stream.span()))
            }
            kind if binary_operator(kind).is_some() => {
                expr = parse_infix(stream, expr)?;
            }
            _ => return Err(stream.unexpected("expected an infix operator")),
        }
    }
}

// ============================================================================
// Tag arguments
// ============================================================================

/// `key: value, key = value`, up to the end of the expression
pub fn parse_keyword_arguments(
    stream: &mut TokenStream,
) -> Result<Vec<(String, Expression)>, LiquidError> {
    let mut args = Vec::new();

    loop {
        let token = stream.next_token();
        match &token.kind {
            TokenKind::Comma => continue,
            TokenKind::Eoi => break,
            TokenKind::Word(_) | TokenKind::Query(_) => {
                let (name, _) = parse_identifier(&token)?;
                if !stream.eat(&TokenKind::Colon) && !stream.eat(&TokenKind::Assign) {
                    return Err(stream.unexpected("expected ':' or '='"));
                }
                let value = parse_primitive(&stream.next_token())?;
                args.push((name, value));
            }
            other => {
                return Err(LiquidError::syntax(
                    format!("expected a list of keyword arguments, found '{}'", other),
                    token.span,
                ))
            }
        }
    }

    Ok(args)
}
