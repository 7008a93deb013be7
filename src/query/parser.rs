//! Query parser
//!
//! Parses Liquid-flavoured JSONPath. Unlike strict RFC 9535, a query may start
//! with a bare name (`user.name`) or a bracketed selection (`['a b']`), and
//! shorthand indices like `.0` are allowed. `$` explicitly starts at the root.
//!
//! The parser works on byte offsets into the full template source so that spans
//! it reports line up with the markup lexer's spans.

use super::filter::{ComparisonOperator, FilterExpression, LogicalOperator};
use super::functions::{function_extension, ExpressionType};
use super::{Query, Segment, Selector, MAX_INT_INDEX, MIN_INT_INDEX};
use crate::error::{LiquidError, Span};
use crate::lexer::unescape::unescape;

pub struct QueryParser<'a> {
    source: &'a str,
    pos: usize,
    /// Stop before `..`, for query bounds inside a range literal
    in_range: bool,
}

impl<'a> QueryParser<'a> {
    pub fn new(source: &'a str, pos: usize) -> Self {
        Self {
            source,
            pos,
            in_range: false,
        }
    }

    /// Treat `..` as the end of the query rather than a descendant segment
    pub fn in_range(mut self) -> Self {
        self.in_range = true;
        self
    }

    /// Parse a query that must span the rest of the source
    pub fn parse_complete(mut self) -> Result<Query, LiquidError> {
        self.skip_whitespace();
        let query = self.parse_query()?;
        self.skip_whitespace();
        if self.pos < self.source.len() {
            return Err(self.unexpected());
        }
        Ok(query)
    }

    /// Parse a query from the current position, returning it along with the
    /// byte offset just past its end
    pub fn parse_prefix(mut self) -> Result<(Query, usize), LiquidError> {
        let query = self.parse_query()?;
        Ok((query, self.pos))
    }

    fn parse_query(&mut self) -> Result<Query, LiquidError> {
        let mut segments = Vec::new();

        match self.peek() {
            Some('$') => {
                self.pos += 1;
            }
            Some('[') => {
                let start = self.pos;
                let selectors = self.parse_bracketed()?;
                segments.push(Segment::Child {
                    selectors,
                    span: Span::new(start, self.pos),
                });
            }
            Some(c) if is_name_first(c) => {
                let start = self.pos;
                let name = self.parse_name();
                segments.push(Segment::Child {
                    selectors: vec![Selector::Name(name)],
                    span: Span::new(start, self.pos),
                });
            }
            _ => return Err(self.unexpected()),
        }

        self.parse_segments(&mut segments)?;
        Ok(Query { segments })
    }

    fn parse_segments(&mut self, segments: &mut Vec<Segment>) -> Result<(), LiquidError> {
        loop {
            let start = self.pos;
            if self.starts_with("..") {
                if self.in_range {
                    break;
                }
                self.pos += 2;
                let selectors = match self.peek() {
                    Some('[') => self.parse_bracketed()?,
                    Some('*') => {
                        self.pos += 1;
                        vec![Selector::Wildcard]
                    }
                    Some(c) if is_name_first(c) => vec![Selector::Name(self.parse_name())],
                    _ => return Err(self.unexpected()),
                };
                segments.push(Segment::Recursive {
                    selectors,
                    span: Span::new(start, self.pos),
                });
            } else if self.starts_with(".") {
                let selector = match self.peek_nth(1) {
                    Some('*') => {
                        self.pos += 2;
                        Selector::Wildcard
                    }
                    Some(c) if is_name_first(c) => {
                        self.pos += 1;
                        Selector::Name(self.parse_name())
                    }
                    Some(c) if c.is_ascii_digit() => {
                        self.pos += 1;
                        Selector::Index(self.parse_index()?)
                    }
                    _ => break,
                };
                segments.push(Segment::Child {
                    selectors: vec![selector],
                    span: Span::new(start, self.pos),
                });
            } else if self.starts_with("[") {
                let selectors = self.parse_bracketed()?;
                segments.push(Segment::Child {
                    selectors,
                    span: Span::new(start, self.pos),
                });
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_bracketed(&mut self) -> Result<Vec<Selector>, LiquidError> {
        self.expect('[')?;
        let mut selectors = Vec::new();

        loop {
            self.skip_whitespace();
            selectors.push(self.parse_selector()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        Ok(selectors)
    }

    fn parse_selector(&mut self) -> Result<Selector, LiquidError> {
        match self.peek() {
            Some('\'') | Some('"') => Ok(Selector::Name(self.parse_string()?)),
            Some('*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            Some('?') => {
                self.pos += 1;
                self.skip_whitespace();
                let expression = self.parse_logical_or()?;
                self.check_test(&expression)?;
                Ok(Selector::Filter(Box::new(expression)))
            }
            Some(':') => self.parse_slice(None),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let index = self.parse_index()?;
                self.skip_whitespace();
                if self.peek() == Some(':') {
                    self.parse_slice(Some(index))
                } else {
                    Ok(Selector::Index(index))
                }
            }
            Some(c) if c == '$' || is_name_first(c) => {
                let in_range = std::mem::replace(&mut self.in_range, false);
                let query = self.parse_query();
                self.in_range = in_range;
                Ok(Selector::SingularQuery(Box::new(query?)))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_slice(&mut self, start: Option<i64>) -> Result<Selector, LiquidError> {
        self.expect(':')?;
        self.skip_whitespace();
        let stop = self.parse_optional_index()?;
        self.skip_whitespace();
        let step = if self.peek() == Some(':') {
            self.pos += 1;
            self.skip_whitespace();
            self.parse_optional_index()?
        } else {
            None
        };
        Ok(Selector::Slice { start, stop, step })
    }

    fn parse_optional_index(&mut self) -> Result<Option<i64>, LiquidError> {
        match self.peek() {
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Some(self.parse_index()?)),
            _ => Ok(None),
        }
    }

    fn parse_index(&mut self) -> Result<i64, LiquidError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }

        let digits = &self.source[digits_start..self.pos];
        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);

        if digits.is_empty() {
            return Err(self.unexpected());
        }
        if (digits.len() > 1 && digits.starts_with('0')) || text == "-0" {
            return Err(LiquidError::syntax(
                format!("invalid index '{}'", text),
                span,
            ));
        }

        match text.parse::<i64>() {
            Ok(i) if (MIN_INT_INDEX..=MAX_INT_INDEX).contains(&i) => Ok(i),
            _ => Err(LiquidError::syntax(
                format!("index out of range '{}'", text),
                span,
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Filter expressions
    // ------------------------------------------------------------------------

    fn parse_logical_or(&mut self) -> Result<FilterExpression, LiquidError> {
        let mut left = self.parse_logical_and()?;
        loop {
            self.skip_whitespace();
            if !self.eat_operator("||", "or") {
                return Ok(left);
            }
            self.skip_whitespace();
            let right = self.parse_logical_and()?;
            self.check_test(&left)?;
            self.check_test(&right)?;
            left = FilterExpression::Logical {
                left: Box::new(left),
                operator: LogicalOperator::Or,
                right: Box::new(right),
            };
        }
    }

    fn parse_logical_and(&mut self) -> Result<FilterExpression, LiquidError> {
        let mut left = self.parse_basic()?;
        loop {
            self.skip_whitespace();
            if !self.eat_operator("&&", "and") {
                return Ok(left);
            }
            self.skip_whitespace();
            let right = self.parse_basic()?;
            self.check_test(&left)?;
            self.check_test(&right)?;
            left = FilterExpression::Logical {
                left: Box::new(left),
                operator: LogicalOperator::And,
                right: Box::new(right),
            };
        }
    }

    fn parse_basic(&mut self) -> Result<FilterExpression, LiquidError> {
        if self.peek() == Some('!') && self.peek_nth(1) != Some('=') {
            self.pos += 1;
            self.skip_whitespace();
            let inner = self.parse_basic()?;
            self.check_test(&inner)?;
            return Ok(FilterExpression::Not(Box::new(inner)));
        }
        if self.eat_keyword("not") {
            self.skip_whitespace();
            let inner = self.parse_basic()?;
            self.check_test(&inner)?;
            return Ok(FilterExpression::Not(Box::new(inner)));
        }

        let left = if self.peek() == Some('(') {
            self.pos += 1;
            self.skip_whitespace();
            let inner = self.parse_logical_or()?;
            self.skip_whitespace();
            self.expect(')')?;
            inner
        } else {
            self.parse_primary()?
        };

        self.skip_whitespace();
        let operator = match self.parse_comparison_operator() {
            Some(op) => op,
            None => return Ok(left),
        };
        self.skip_whitespace();
        let start = self.pos;
        let right = self.parse_primary()?;

        for operand in [&left, &right] {
            if !is_comparable(operand) {
                return Err(LiquidError::type_error(
                    format!("non-singular query '{}' is not comparable", operand),
                    Span::new(start, self.pos),
                ));
            }
        }

        Ok(FilterExpression::Comparison {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<FilterExpression, LiquidError> {
        let start = self.pos;
        match self.peek() {
            Some('@') => {
                self.pos += 1;
                let mut segments = Vec::new();
                self.parse_segments(&mut segments)?;
                Ok(FilterExpression::RelativeQuery(Box::new(Query { segments })))
            }
            Some('$') => {
                self.pos += 1;
                let mut segments = Vec::new();
                self.parse_segments(&mut segments)?;
                Ok(FilterExpression::RootQuery(Box::new(Query { segments })))
            }
            Some('\'') | Some('"') => Ok(FilterExpression::String(self.parse_string()?)),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_lowercase() => {
                if self.eat_keyword("true") {
                    return Ok(FilterExpression::True);
                }
                if self.eat_keyword("false") {
                    return Ok(FilterExpression::False);
                }
                if self.eat_keyword("null") || self.eat_keyword("nil") {
                    return Ok(FilterExpression::Null);
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                {
                    self.pos += 1;
                }
                let name = self.source[start..self.pos].to_string();
                if self.peek() != Some('(') {
                    return Err(LiquidError::syntax(
                        format!("unexpected '{}' in filter expression", name),
                        Span::new(start, self.pos),
                    ));
                }
                self.parse_function(name, start)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_function(&mut self, name: String, start: usize) -> Result<FilterExpression, LiquidError> {
        let func = function_extension(&name).ok_or_else(|| {
            LiquidError::name(
                format!("unknown function '{}'", name),
                Span::new(start, self.pos),
            )
        })?;

        self.expect('(')?;
        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.pos += 1;
                break;
            }
            args.push(self.parse_logical_or()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        let span = Span::new(start, self.pos);
        let types = func.arg_types();
        if args.len() != types.len() {
            return Err(LiquidError::type_error(
                format!(
                    "{}() takes {} argument{} but {} were given",
                    name,
                    types.len(),
                    if types.len() == 1 { "" } else { "s" },
                    args.len()
                ),
                span,
            ));
        }

        for (arg, ty) in args.iter().zip(types) {
            let ok = match ty {
                ExpressionType::Value => is_comparable(arg),
                ExpressionType::Logical => match arg {
                    FilterExpression::RelativeQuery(_)
                    | FilterExpression::RootQuery(_)
                    | FilterExpression::Not(_)
                    | FilterExpression::Logical { .. }
                    | FilterExpression::Comparison { .. } => true,
                    FilterExpression::Function { .. } => return_type(arg) != ExpressionType::Value,
                    _ => false,
                },
                ExpressionType::Nodes => match arg {
                    FilterExpression::RelativeQuery(_) | FilterExpression::RootQuery(_) => true,
                    FilterExpression::Function { .. } => return_type(arg) == ExpressionType::Nodes,
                    _ => false,
                },
            };
            if !ok {
                return Err(LiquidError::type_error(
                    format!("{}() argument '{}' is not of type {:?}", name, arg, ty),
                    span,
                ));
            }
        }

        Ok(FilterExpression::Function { name, args })
    }

    fn parse_comparison_operator(&mut self) -> Option<ComparisonOperator> {
        let ops = [
            ("==", ComparisonOperator::Eq),
            ("!=", ComparisonOperator::Ne),
            ("<=", ComparisonOperator::Le),
            (">=", ComparisonOperator::Ge),
            ("<", ComparisonOperator::Lt),
            (">", ComparisonOperator::Gt),
        ];
        for (text, op) in ops {
            if self.starts_with(text) {
                self.pos += text.len();
                return Some(op);
            }
        }
        None
    }

    /// Literals and comparisons are not valid on their own as a filter test
    fn check_test(&self, expression: &FilterExpression) -> Result<(), LiquidError> {
        let ok = match expression {
            FilterExpression::Function { .. } => return_type(expression) != ExpressionType::Value,
            FilterExpression::True
            | FilterExpression::False
            | FilterExpression::Null
            | FilterExpression::String(_)
            | FilterExpression::Int(_)
            | FilterExpression::Float(_) => false,
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(LiquidError::syntax(
                format!("filter expression '{}' is not a test", expression),
                Span::new(self.pos, self.pos),
            ))
        }
    }

    fn parse_number(&mut self) -> Result<FilterExpression, LiquidError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' if !is_float && matches!(self.peek_nth(1), Some(d) if d.is_ascii_digit()) => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let invalid = || LiquidError::syntax(format!("invalid number '{}'", text), span);

        if is_float {
            text.parse::<f64>().map(FilterExpression::Float).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(FilterExpression::Int).map_err(|_| invalid())
        }
    }

    // ------------------------------------------------------------------------
    // Scanning helpers
    // ------------------------------------------------------------------------

    fn parse_string(&mut self) -> Result<String, LiquidError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q) => q,
            None => return Err(self.unexpected()),
        };
        self.pos += 1;

        let body_start = self.pos;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => self.bump(),
                None => {
                    return Err(LiquidError::syntax(
                        "unterminated string literal",
                        Span::new(start, self.pos),
                    ))
                }
            }
        }
        let body = &self.source[body_start..self.pos];
        self.pos += 1;
        unescape(body, Span::new(start, self.pos))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.bump();
            } else if c == '-' && matches!(self.peek_nth(1), Some(n) if is_name_char(n)) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn eat_operator(&mut self, symbol: &str, word: &str) -> bool {
        if self.starts_with(symbol) {
            self.pos += symbol.len();
            return true;
        }
        self.eat_keyword(word)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }
        let after = self.source[self.pos + word.len()..].chars().next();
        if matches!(after, Some(c) if is_name_char(c) || c == '(') {
            return false;
        }
        self.pos += word.len();
        true
    }

    fn expect(&mut self, c: char) -> Result<(), LiquidError> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(LiquidError::syntax(
                format!("expected '{}', found {}", c, self.describe_current()),
                Span::new(self.pos, self.pos + 1),
            ))
        }
    }

    fn unexpected(&self) -> LiquidError {
        LiquidError::syntax(
            format!("unexpected {} in query", self.describe_current()),
            Span::new(self.pos, self.pos + 1),
        )
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "end of expression".to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.pos..].starts_with(s)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }
}

fn return_type(expression: &FilterExpression) -> ExpressionType {
    match expression {
        FilterExpression::Function { name, .. } => function_extension(name)
            .map(|f| f.return_type())
            .unwrap_or(ExpressionType::Value),
        FilterExpression::RelativeQuery(_) | FilterExpression::RootQuery(_) => ExpressionType::Nodes,
        FilterExpression::Not(_) | FilterExpression::Logical { .. } | FilterExpression::Comparison { .. } => {
            ExpressionType::Logical
        }
        _ => ExpressionType::Value,
    }
}

/// Literals, singular queries and value typed function calls
fn is_comparable(expression: &FilterExpression) -> bool {
    match expression {
        FilterExpression::True
        | FilterExpression::False
        | FilterExpression::Null
        | FilterExpression::String(_)
        | FilterExpression::Int(_)
        | FilterExpression::Float(_) => true,
        FilterExpression::RelativeQuery(q) | FilterExpression::RootQuery(q) => q.is_singular(),
        FilterExpression::Function { .. } => return_type(expression) == ExpressionType::Value,
        _ => false,
    }
}

pub(crate) fn is_name_first(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

pub(crate) fn is_name_char(c: char) -> bool {
    is_name_first(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_and_brackets() {
        let query = Query::parse("a.b[0]['c d'][\"e\"]").unwrap();
        assert_eq!(query.segments.len(), 5);
        assert_eq!(query.segments[4].selectors(), &[Selector::Name("e".into())]);
    }

    #[test]
    fn test_hyphenated_names_and_dot_index() {
        let query = Query::parse("site.data-set.0").unwrap();
        assert_eq!(
            query.segments[1].selectors(),
            &[Selector::Name("data-set".into())]
        );
        assert_eq!(query.segments[2].selectors(), &[Selector::Index(0)]);
    }

    #[test]
    fn test_prefix_stops_at_non_query() {
        let source = "{{ a.b | upcase }}";
        let (query, end) = QueryParser::new(source, 3).parse_prefix().unwrap();
        assert_eq!(query.to_string(), "a.b");
        assert_eq!(end, 6);
    }

    #[test]
    fn test_range_mode_stops_at_double_dot() {
        let source = "(a.b..c)";
        let (query, end) = QueryParser::new(source, 1).in_range().parse_prefix().unwrap();
        assert_eq!(query.to_string(), "a.b");
        assert_eq!(&source[end..], "..c)");
    }

    #[test]
    fn test_index_range_and_leading_zero() {
        assert!(Query::parse("a[9007199254740991]").is_ok());
        assert!(Query::parse("a[9007199254740992]").is_err());
        assert!(Query::parse("a[01]").is_err());
        assert!(Query::parse("a[-0]").is_err());
    }

    #[test]
    fn test_filter_syntax() {
        assert!(Query::parse("a[?@.x > 1 && @.y]").is_ok());
        assert!(Query::parse("a[?@.x > 1 and not @.y]").is_ok());
        assert!(Query::parse("a[?(@.x == 'a' || @.y == \"b\")]").is_ok());
        assert!(Query::parse("a[?1]").is_err());
        assert!(Query::parse("a[?@.x == 1").is_err());
    }

    #[test]
    fn test_function_validation() {
        assert!(Query::parse("a[?length(@.x) > 2]").is_ok());
        assert!(Query::parse("a[?count(@.*) == 1]").is_ok());
        assert!(matches!(
            Query::parse("a[?nosuch(@.x)]").unwrap_err(),
            LiquidError::Name(_)
        ));
        // length() returns a value, which is not a test
        assert!(Query::parse("a[?length(@.x)]").is_err());
        // count() needs nodes
        assert!(Query::parse("a[?count(1) == 1]").is_err());
        assert!(Query::parse("a[?length(@.x, @.y) == 1]").is_err());
    }

    #[test]
    fn test_non_singular_comparison() {
        assert!(Query::parse("a[?@.* == 1]").is_err());
    }

    #[test]
    fn test_unterminated() {
        assert!(Query::parse("a['b").is_err());
        assert!(Query::parse("a[1").is_err());
        assert!(Query::parse("a..").is_err());
    }
}
