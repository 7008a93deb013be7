//! Markup lexer
//!
//! Splits template source into content, output statements, tags, comments and
//! raw blocks. Expressions inside output statements and tags are tokenized at
//! the same time, so a `}}` inside a string literal does not end an output
//! statement early.

pub mod expression;
pub mod token;
pub mod unescape;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LiquidError, Span};

pub use expression::{tokenize_expression, ExpressionLexer, Terminator};
pub use token::{RangeArgument, Token, TokenKind, TokenStream};

lazy_static! {
    static ref END_RAW: Regex =
        Regex::new(r"\{%([-+~]?)\s*endraw\s*([-+~]?)%\}").expect("valid endraw pattern");
}

/// Whitespace control marker, written just inside a delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Whitespace {
    /// `+`, keep whitespace
    Plus,
    /// `-`, strip all whitespace
    Minus,
    /// `~`, strip newlines only
    Smart,
    /// No marker, use the environment's default
    #[default]
    Default,
}

impl Whitespace {
    pub fn from_char(c: char) -> Self {
        match c {
            '+' => Whitespace::Plus,
            '-' => Whitespace::Minus,
            '~' => Whitespace::Smart,
            _ => Whitespace::Default,
        }
    }
}

/// A markup token
#[derive(Debug, Clone, PartialEq)]
pub enum Markup {
    Content {
        span: Span,
        text: String,
    },
    /// `{% raw %}...{% endraw %}`, with markers for both tags
    Raw {
        span: Span,
        wc: [Whitespace; 4],
        text: String,
    },
    Comment {
        span: Span,
        wc: (Whitespace, Whitespace),
        text: String,
    },
    Output {
        span: Span,
        wc: (Whitespace, Whitespace),
        expression: Vec<Token>,
    },
    Tag {
        span: Span,
        wc: (Whitespace, Whitespace),
        name: String,
        expression: Vec<Token>,
    },
    /// `{% liquid %}`, one tag or comment per line
    Lines {
        span: Span,
        wc: (Whitespace, Whitespace),
        statements: Vec<Markup>,
    },
    Eoi {
        span: Span,
    },
}

impl Markup {
    pub fn span(&self) -> Span {
        match self {
            Markup::Content { span, .. }
            | Markup::Raw { span, .. }
            | Markup::Comment { span, .. }
            | Markup::Output { span, .. }
            | Markup::Tag { span, .. }
            | Markup::Lines { span, .. }
            | Markup::Eoi { span } => *span,
        }
    }

    /// Marker just inside the opening delimiter
    pub fn left_wc(&self) -> Whitespace {
        match self {
            Markup::Raw { wc, .. } => wc[0],
            Markup::Comment { wc, .. }
            | Markup::Output { wc, .. }
            | Markup::Tag { wc, .. }
            | Markup::Lines { wc, .. } => wc.0,
            Markup::Content { .. } | Markup::Eoi { .. } => Whitespace::Default,
        }
    }

    /// Marker just inside the closing delimiter
    pub fn right_wc(&self) -> Whitespace {
        match self {
            Markup::Raw { wc, .. } => wc[3],
            Markup::Comment { wc, .. }
            | Markup::Output { wc, .. }
            | Markup::Tag { wc, .. }
            | Markup::Lines { wc, .. } => wc.1,
            Markup::Content { .. } | Markup::Eoi { .. } => Whitespace::Default,
        }
    }

    pub fn is_tag(&self, tag_name: &str) -> bool {
        matches!(self, Markup::Tag { name, .. } if name == tag_name)
    }
}

/// Lexer for Liquid templates
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Tokenize the entire input. The last token is always `Markup::Eoi`.
    pub fn tokenize(&mut self) -> Result<Vec<Markup>, LiquidError> {
        let mut tokens = Vec::new();

        while self.pos < self.source.len() {
            let token = if self.starts_with("{{") {
                self.read_output()?
            } else if self.starts_with("{%") {
                self.read_tag()?
            } else if self.starts_with("{#") {
                self.read_comment()?
            } else {
                self.read_content()
            };
            tokens.push(token);
        }

        let end = self.source.len();
        tokens.push(Markup::Eoi {
            span: Span::new(end, end),
        });
        Ok(tokens)
    }

    fn read_content(&mut self) -> Markup {
        let start = self.pos;
        let bytes = self.source.as_bytes();
        let mut i = start + 1;

        while i < bytes.len() {
            if bytes[i - 1] == b'{' && matches!(bytes[i], b'{' | b'%' | b'#') {
                i -= 1;
                break;
            }
            i += 1;
        }

        let end = i.min(bytes.len());
        self.pos = end;
        Markup::Content {
            span: Span::new(start, end),
            text: self.source[start..end].to_string(),
        }
    }

    fn read_output(&mut self) -> Result<Markup, LiquidError> {
        let start = self.pos;
        self.pos += 2;
        let left = self.read_wc();

        let scanned = ExpressionLexer::new(self.source, self.pos, Terminator::Output)
            .tokenize()
            .map_err(|e| self.unclosed(e, start, "output statement"))?;

        self.pos = scanned.end;
        self.skip_close(scanned.wc, "}}");

        Ok(Markup::Output {
            span: Span::new(start, self.pos),
            wc: (left, scanned.wc),
            expression: scanned.tokens,
        })
    }

    fn read_tag(&mut self) -> Result<Markup, LiquidError> {
        let start = self.pos;
        self.pos += 2;
        let left = self.read_wc();
        self.skip_whitespace();

        if self.starts_with("#") {
            return self.read_inline_comment(start, left);
        }

        let name = self.read_name();
        if name.is_empty() {
            return Err(LiquidError::syntax(
                "missing tag name",
                Span::new(start, self.pos.max(start + 2)),
            ));
        }

        match name.as_str() {
            "raw" => self.read_raw(start, left),
            "liquid" => self.read_lines(start, left),
            _ => {
                let scanned = ExpressionLexer::new(self.source, self.pos, Terminator::Tag)
                    .tokenize()
                    .map_err(|e| self.unclosed(e, start, "tag"))?;
                self.pos = scanned.end;
                self.skip_close(scanned.wc, "%}");

                Ok(Markup::Tag {
                    span: Span::new(start, self.pos),
                    wc: (left, scanned.wc),
                    name,
                    expression: scanned.tokens,
                })
            }
        }
    }

    /// `{% # a comment %}`
    fn read_inline_comment(&mut self, start: usize, left: Whitespace) -> Result<Markup, LiquidError> {
        let rest = &self.source[self.pos..];
        let close = rest
            .find("%}")
            .ok_or_else(|| LiquidError::syntax("unclosed comment", Span::new(start, self.source.len())))?;

        let mut text_end = self.pos + close;
        let right = match rest[..close].chars().last() {
            Some(c @ ('-' | '+' | '~')) => {
                text_end -= 1;
                Whitespace::from_char(c)
            }
            _ => Whitespace::Default,
        };

        let text = self.source[self.pos + 1..text_end].to_string();
        self.pos += close + 2;
        Ok(Markup::Comment {
            span: Span::new(start, self.pos),
            wc: (left, right),
            text,
        })
    }

    fn read_raw(&mut self, start: usize, left: Whitespace) -> Result<Markup, LiquidError> {
        self.skip_whitespace();
        let inner_right = self.read_wc();
        if !self.starts_with("%}") {
            return Err(LiquidError::syntax(
                "expected '%}' after 'raw'",
                Span::new(start, self.pos),
            ));
        }
        self.pos += 2;

        let caps = END_RAW.captures(&self.source[self.pos..]).ok_or_else(|| {
            LiquidError::syntax("raw block was never closed", Span::new(start, self.pos))
        })?;
        let (whole, inner_left, right) = match (caps.get(0), caps.get(1), caps.get(2)) {
            (Some(whole), Some(l), Some(r)) => (whole, l.as_str(), r.as_str()),
            _ => {
                return Err(LiquidError::syntax(
                    "raw block was never closed",
                    Span::new(start, self.pos),
                ))
            }
        };

        let text = self.source[self.pos..self.pos + whole.start()].to_string();
        let wc = [
            left,
            inner_right,
            marker(inner_left),
            marker(right),
        ];
        self.pos += whole.end();

        Ok(Markup::Raw {
            span: Span::new(start, self.pos),
            wc,
            text,
        })
    }

    fn read_lines(&mut self, start: usize, left: Whitespace) -> Result<Markup, LiquidError> {
        let mut statements = Vec::new();

        let right = loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.bump();
            }

            let rest = &self.source[self.pos..];
            if rest.starts_with("%}") {
                self.pos += 2;
                break Whitespace::Default;
            }
            if let Some(c @ ('-' | '+' | '~')) = self.peek() {
                if rest[1..].starts_with("%}") {
                    self.pos += 3;
                    break Whitespace::from_char(c);
                }
            }
            if rest.is_empty() {
                return Err(LiquidError::syntax(
                    "liquid tag was never closed",
                    Span::new(start, self.pos),
                ));
            }

            let line_start = self.pos;
            if self.starts_with("#") {
                let line_end = rest.find('\n').unwrap_or(rest.len());
                let line = &rest[..line_end];
                // A trailing comment may share its line with the closing delimiter
                let text_end = match line.find("%}") {
                    Some(i) => line[..i].trim_end_matches(&['-', '+', '~'][..]).len(),
                    None => line_end,
                };
                let text = rest[1..text_end].to_string();
                self.pos += text_end;
                statements.push(Markup::Comment {
                    span: Span::new(line_start, self.pos),
                    wc: (Whitespace::Default, Whitespace::Default),
                    text,
                });
                continue;
            }

            let name = self.read_name();
            if name.is_empty() {
                return Err(LiquidError::syntax(
                    format!("unexpected '{}' in liquid tag", self.peek().unwrap_or(' ')),
                    Span::new(self.pos, self.pos + 1),
                ));
            }

            let scanned = ExpressionLexer::new(self.source, self.pos, Terminator::Line).tokenize()?;
            self.pos = scanned.end;
            statements.push(Markup::Tag {
                span: Span::new(line_start, self.pos),
                wc: (Whitespace::Default, Whitespace::Default),
                name,
                expression: scanned.tokens,
            });

            if scanned.closed {
                self.skip_close(scanned.wc, "%}");
                break scanned.wc;
            }
        };

        Ok(Markup::Lines {
            span: Span::new(start, self.pos),
            wc: (left, right),
            statements,
        })
    }

    /// `{# ... #}`, where the closing delimiter repeats the opening hashes
    fn read_comment(&mut self) -> Result<Markup, LiquidError> {
        let start = self.pos;
        self.pos += 1;
        let hashes_start = self.pos;
        while self.starts_with("#") {
            self.pos += 1;
        }
        let hashes = &self.source[hashes_start..self.pos];
        let left = self.read_wc();

        let close = format!("{}}}", hashes);
        let found = self.source[self.pos..].find(&close).ok_or_else(|| {
            LiquidError::syntax("comment was never closed", Span::new(start, self.source.len()))
        })?;

        let mut text_end = self.pos + found;
        let right = match self.source[self.pos..text_end].chars().last() {
            Some(c @ ('-' | '+' | '~')) => {
                text_end -= 1;
                Whitespace::from_char(c)
            }
            _ => Whitespace::Default,
        };

        let text = self.source[self.pos..text_end].to_string();
        self.pos += found + close.len();

        Ok(Markup::Comment {
            span: Span::new(start, self.pos),
            wc: (left, right),
            text,
        })
    }

    fn read_wc(&mut self) -> Whitespace {
        match self.peek() {
            Some(c @ ('-' | '+' | '~')) => {
                self.pos += 1;
                Whitespace::from_char(c)
            }
            _ => Whitespace::Default,
        }
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    /// Step over an optional marker and a closing delimiter
    fn skip_close(&mut self, wc: Whitespace, close: &str) {
        if wc != Whitespace::Default {
            self.pos += 1;
        }
        self.pos += close.len();
    }

    /// Report a missing closing delimiter from the start of the markup
    fn unclosed(&self, err: LiquidError, start: usize, what: &str) -> LiquidError {
        match err.span() {
            Some(span) if span.start >= self.source.len() => LiquidError::syntax(
                format!("{} was never closed", what),
                Span::new(start, self.source.len()),
            ),
            _ => err,
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

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }
}

fn marker(s: &str) -> Whitespace {
    s.chars().next().map(Whitespace::from_char).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Markup> {
        Lexer::new(source).tokenize().unwrap()
    }

    #[test]
    fn test_content_and_output() {
        let tokens = tokenize("Hello, {{ you }}!");
        assert_eq!(tokens.len(), 4);
        assert_eq!(
            tokens[0],
            Markup::Content {
                span: Span::new(0, 7),
                text: "Hello, ".to_string()
            }
        );
        assert_eq!(tokens[1].span(), Span::new(7, 16));
        assert!(matches!(&tokens[2], Markup::Content { text, .. } if text == "!"));
        assert!(matches!(tokens[3], Markup::Eoi { .. }));
    }

    #[test]
    fn test_whitespace_markers() {
        let tokens = tokenize("{{- x ~}}{%+ if y -%}{#~ c +#}");
        assert_eq!(tokens[0].left_wc(), Whitespace::Minus);
        assert_eq!(tokens[0].right_wc(), Whitespace::Smart);
        assert_eq!(tokens[1].left_wc(), Whitespace::Plus);
        assert_eq!(tokens[1].right_wc(), Whitespace::Minus);
        assert!(tokens[1].is_tag("if"));
        assert_eq!(tokens[2].left_wc(), Whitespace::Smart);
        assert_eq!(tokens[2].right_wc(), Whitespace::Plus);
    }

    #[test]
    fn test_string_containing_close() {
        let tokens = tokenize("{{ '}}' }}x");
        assert!(matches!(&tokens[0], Markup::Output { expression, .. } if expression.len() == 1));
        assert!(matches!(&tokens[1], Markup::Content { text, .. } if text == "x"));
    }

    #[test]
    fn test_raw() {
        let tokens = tokenize("{% raw %}{{ not parsed }}{%- endraw ~%}");
        match &tokens[0] {
            Markup::Raw { text, wc, .. } => {
                assert_eq!(text, "{{ not parsed }}");
                assert_eq!(wc[2], Whitespace::Minus);
                assert_eq!(wc[3], Whitespace::Smart);
            }
            other => panic!("expected raw, found {:?}", other),
        }
    }

    #[test]
    fn test_comments() {
        let tokens = tokenize("{# one #}{## two #} ##}{% # three %}");
        assert!(matches!(&tokens[0], Markup::Comment { text, .. } if text == " one "));
        assert!(matches!(&tokens[1], Markup::Comment { text, .. } if text == " two #} "));
        assert!(matches!(&tokens[2], Markup::Comment { text, .. } if text == " three "));
    }

    #[test]
    fn test_liquid_lines() {
        let source = "{% liquid\n  assign x = 1\n  # note\n  echo x -%}";
        let tokens = tokenize(source);
        match &tokens[0] {
            Markup::Lines { statements, wc, .. } => {
                assert_eq!(statements.len(), 3);
                assert!(statements[0].is_tag("assign"));
                assert!(matches!(&statements[1], Markup::Comment { text, .. } if text == " note"));
                assert!(statements[2].is_tag("echo"));
                assert_eq!(wc.1, Whitespace::Minus);
            }
            other => panic!("expected liquid lines, found {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_markup() {
        let err = Lexer::new("abc {{ x").tokenize().unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
        assert_eq!(err.span(), Some(Span::new(4, 8)));
        assert!(Lexer::new("{% if x").tokenize().is_err());
        assert!(Lexer::new("{# x").tokenize().is_err());
        assert!(Lexer::new("{% raw %} x").tokenize().is_err());
        assert!(Lexer::new("{% %}").tokenize().is_err());
    }
}
