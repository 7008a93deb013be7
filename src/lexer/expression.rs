//! Expression tokenizer
//!
//! Scans the inside of an output statement, a tag or a `{% liquid %}` line.
//! Variable references are handed to the [`QueryParser`], which reports how
//! far it got.

use super::token::{RangeArgument, Token, TokenKind};
use super::unescape::unescape;
use super::Whitespace;
use crate::error::{LiquidError, Span};
use crate::query::QueryParser;

/// What ends the expression being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `}}`
    Output,
    /// `%}`
    Tag,
    /// A newline or the `%}` closing the enclosing `liquid` tag
    Line,
    /// The end of the source
    End,
}

/// Result of scanning one expression
#[derive(Debug)]
pub struct Scanned {
    pub tokens: Vec<Token>,
    /// Offset of the terminator, or of the whitespace control marker before it
    pub end: usize,
    /// Whitespace control marker before the closing delimiter
    pub wc: Whitespace,
    /// True when a `liquid` line ended at the closing `%}` rather than a newline
    pub closed: bool,
}

pub struct ExpressionLexer<'a> {
    source: &'a str,
    pos: usize,
    terminator: Terminator,
}

impl<'a> ExpressionLexer<'a> {
    pub fn new(source: &'a str, pos: usize, terminator: Terminator) -> Self {
        Self {
            source,
            pos,
            terminator,
        }
    }

    pub fn tokenize(mut self) -> Result<Scanned, LiquidError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if let Some((wc, closed)) = self.at_end() {
                return Ok(Scanned {
                    tokens,
                    end: self.pos,
                    wc,
                    closed,
                });
            }

            let c = match self.peek() {
                Some(c) => c,
                None => {
                    return Err(LiquidError::syntax(
                        "unexpected end of template, expected a closing delimiter",
                        Span::new(self.pos, self.pos),
                    ))
                }
            };

            let start = self.pos;
            let kind = match c {
                '\'' | '"' => TokenKind::String(self.scan_string()?),
                '(' => match self.try_range()? {
                    Some(kind) => kind,
                    None => {
                        self.pos += 1;
                        TokenKind::LeftParen
                    }
                },
                ')' => self.symbol(1, TokenKind::RightParen),
                ':' => self.symbol(1, TokenKind::Colon),
                ',' => self.symbol(1, TokenKind::Comma),
                '|' if self.starts_with("||") => self.symbol(2, TokenKind::DoublePipe),
                '|' => self.symbol(1, TokenKind::Pipe),
                '=' if self.starts_with("==") => self.symbol(2, TokenKind::Eq),
                '=' => self.symbol(1, TokenKind::Assign),
                '!' if self.starts_with("!=") => self.symbol(2, TokenKind::Ne),
                '<' if self.starts_with("<>") => self.symbol(2, TokenKind::Ne),
                '<' if self.starts_with("<=") => self.symbol(2, TokenKind::Le),
                '<' => self.symbol(1, TokenKind::Lt),
                '>' if self.starts_with(">=") => self.symbol(2, TokenKind::Ge),
                '>' => self.symbol(1, TokenKind::Gt),
                '-' | '0'..='9' => self.scan_number()?,
                _ => self.scan_query()?,
            };

            tokens.push(Token::new(kind, Span::new(start, self.pos)));
        }
    }

    /// Check for the closing delimiter, leaving the position at the marker
    fn at_end(&self) -> Option<(Whitespace, bool)> {
        let rest = &self.source[self.pos..];

        if self.terminator == Terminator::End {
            return rest.is_empty().then_some((Whitespace::Default, true));
        }

        if self.terminator == Terminator::Line && (rest.starts_with('\n') || rest.starts_with("\r\n")) {
            return Some((Whitespace::Default, false));
        }

        let close = match self.terminator {
            Terminator::Output => "}}",
            Terminator::Tag | Terminator::Line | Terminator::End => "%}",
        };

        let (wc, rest) = match rest.chars().next() {
            Some(c @ ('-' | '+' | '~')) => (Whitespace::from_char(c), &rest[1..]),
            _ => (Whitespace::Default, rest),
        };

        if rest.starts_with(close) {
            Some((wc, true))
        } else {
            None
        }
    }

    fn symbol(&mut self, len: usize, kind: TokenKind) -> TokenKind {
        self.pos += len;
        kind
    }

    fn scan_string(&mut self) -> Result<String, LiquidError> {
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

    fn scan_number(&mut self) -> Result<TokenKind, LiquidError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            if !matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit()) {
                return Err(self.unexpected());
            }
            self.pos += 1;
        }

        self.skip_digits();
        let mut has_fraction = false;
        if self.peek() == Some('.') && matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit()) {
            has_fraction = true;
            self.pos += 1;
            self.skip_digits();
        }

        let mut exponent: Option<i32> = None;
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.pos += 1;
            let exp_start = self.pos;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            let digits_start = self.pos;
            self.skip_digits();
            if self.pos == digits_start {
                self.pos = save;
            } else {
                exponent = self.source[exp_start..self.pos].parse().ok();
            }
        }

        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let invalid = || LiquidError::syntax(format!("invalid number '{}'", text), span);

        match exponent {
            None if !has_fraction => text.parse::<i64>().map(TokenKind::Int).map_err(|_| invalid()),
            Some(exp) if !has_fraction && exp >= 0 => {
                let mantissa = text
                    .split(|c| c == 'e' || c == 'E')
                    .next()
                    .and_then(|m| m.parse::<i64>().ok())
                    .ok_or_else(invalid)?;
                10i64
                    .checked_pow(exp as u32)
                    .and_then(|p| mantissa.checked_mul(p))
                    .map(TokenKind::Int)
                    .ok_or_else(invalid)
            }
            _ => text.parse::<f64>().map(TokenKind::Float).map_err(|_| invalid()),
        }
    }

    fn scan_query(&mut self) -> Result<TokenKind, LiquidError> {
        let start = self.pos;
        let (query, end) = QueryParser::new(self.source, self.pos).parse_prefix()?;
        self.pos = end;

        if let Some(word) = query.as_word() {
            // A keyword only when written as a bare identifier
            let bare = &self.source[start..end] == word;
            if bare {
                if let Some(keyword) = TokenKind::keyword(word) {
                    return Ok(keyword);
                }
                return Ok(TokenKind::Word(word.to_string()));
            }
        }
        Ok(TokenKind::Query(query))
    }

    /// Attempt to scan `(start..stop)`, restoring the position on failure
    fn try_range(&mut self) -> Result<Option<TokenKind>, LiquidError> {
        let save = self.pos;
        self.pos += 1;
        self.skip_whitespace();

        let start = match self.range_argument()? {
            Some(arg) => arg,
            None => {
                self.pos = save;
                return Ok(None);
            }
        };
        self.skip_whitespace();
        if !self.starts_with("..") {
            self.pos = save;
            return Ok(None);
        }
        self.pos += 2;
        self.skip_whitespace();

        let stop = match self.range_argument()? {
            Some(arg) => arg,
            None => return Err(self.unexpected()),
        };
        self.skip_whitespace();
        if self.peek() != Some(')') {
            return Err(LiquidError::syntax(
                "expected ')' to close range",
                Span::new(save, self.pos),
            ));
        }
        self.pos += 1;
        Ok(Some(TokenKind::Range(start, stop)))
    }

    fn range_argument(&mut self) -> Result<Option<RangeArgument>, LiquidError> {
        match self.peek() {
            Some('\'') | Some('"') => Ok(Some(RangeArgument::String(self.scan_string()?))),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let save = self.pos;
                match self.scan_number() {
                    Ok(TokenKind::Int(i)) => Ok(Some(RangeArgument::Int(i))),
                    Ok(TokenKind::Float(f)) => Ok(Some(RangeArgument::Float(f))),
                    _ => {
                        self.pos = save;
                        Ok(None)
                    }
                }
            }
            Some(c) if c == '$' || c == '[' || crate::query::is_name_first(c) => {
                let save = self.pos;
                match QueryParser::new(self.source, self.pos).in_range().parse_prefix() {
                    Ok((query, end)) => {
                        self.pos = end;
                        Ok(Some(RangeArgument::Query(query)))
                    }
                    Err(_) => {
                        self.pos = save;
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() || (self.terminator == Terminator::Line && (c == '\n' || c == '\r')) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self) -> LiquidError {
        match self.peek() {
            Some(c) => LiquidError::syntax(
                format!("unexpected '{}'", c),
                Span::new(self.pos, self.pos + c.len_utf8()),
            ),
            None => LiquidError::syntax("unexpected end of template", Span::new(self.pos, self.pos)),
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

/// Tokenize a standalone expression, like `a.b | upcase`
pub fn tokenize_expression(source: &str) -> Result<Vec<Token>, LiquidError> {
    Ok(ExpressionLexer::new(source, 0, Terminator::End).tokenize()?.tokens)
}
