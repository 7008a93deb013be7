//! Expression tokens

use std::fmt;

use crate::error::{LiquidError, Span};
use crate::query::Query;

/// One bound of a range literal like `(1..item.size)`
#[derive(Debug, Clone, PartialEq)]
pub enum RangeArgument {
    String(String),
    Int(i64),
    Float(f64),
    Query(Query),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    True,
    False,
    Nil,
    And,
    Or,
    Not,
    In,
    Contains,
    If,
    Else,
    With,
    Required,
    As,
    For,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Colon,
    Pipe,
    DoublePipe,
    Comma,
    LeftParen,
    RightParen,
    Assign,
    String(String),
    Int(i64),
    Float(f64),
    /// A bare identifier, which is a variable, a filter name or a tag argument
    /// depending on where it appears
    Word(String),
    Range(RangeArgument, RangeArgument),
    Query(Query),
    Eoi,
}

impl TokenKind {
    /// Same variant, ignoring any data
    pub fn is(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" | "null" => TokenKind::Nil,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "contains" => TokenKind::Contains,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "with" => TokenKind::With,
            "required" => TokenKind::Required,
            "as" => TokenKind::As,
            "for" => TokenKind::For,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::In => "in",
            TokenKind::Contains => "contains",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::With => "with",
            TokenKind::Required => "required",
            TokenKind::As => "as",
            TokenKind::For => "for",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Colon => ":",
            TokenKind::Pipe => "|",
            TokenKind::DoublePipe => "||",
            TokenKind::Comma => ",",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Assign => "=",
            TokenKind::String(s) => return write!(f, "{:?}", s),
            TokenKind::Int(i) => return write!(f, "{}", i),
            TokenKind::Float(x) => return write!(f, "{}", x),
            TokenKind::Word(w) => return f.write_str(w),
            TokenKind::Range(..) => "range",
            TokenKind::Query(q) => return write!(f, "{}", q),
            TokenKind::Eoi => "end of expression",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Step through the tokens of one expression.
///
/// Past the last token, `current` keeps returning an `Eoi` token.
pub struct TokenStream<'t> {
    tokens: &'t [Token],
    pos: usize,
    eoi: Token,
}

impl<'t> TokenStream<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
        Self {
            tokens,
            pos: 0,
            eoi: Token::new(TokenKind::Eoi, Span::new(end, end)),
        }
    }

    pub fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eoi)
    }

    pub fn peek(&self) -> &Token {
        self.tokens.get(self.pos + 1).unwrap_or(&self.eoi)
    }

    pub fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    pub fn span(&self) -> Span {
        self.current().span
    }

    /// Return the current token and move past it
    pub fn next_token(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub fn at_end(&self) -> bool {
        matches!(self.kind(), TokenKind::Eoi)
    }

    /// Consume the current token if it is of the given kind
    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.kind().is(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `word` if it is the current token
    pub fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.kind(), TokenKind::Word(w) if w == word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: &TokenKind) -> Result<(), LiquidError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", kind)))
        }
    }

    pub fn expect_eoi(&self) -> Result<(), LiquidError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("expected end of expression"))
        }
    }

    /// Consume a word or a single-name query, returning the name
    pub fn expect_name(&mut self) -> Result<(String, Span), LiquidError> {
        let span = self.span();
        let name = match self.kind() {
            TokenKind::Word(w) => w.clone(),
            TokenKind::String(s) => s.clone(),
            _ => return Err(self.unexpected("expected a name")),
        };
        self.advance();
        Ok((name, span))
    }

    pub fn unexpected(&self, message: &str) -> LiquidError {
        let token = self.current();
        LiquidError::syntax(format!("{}, found '{}'", message, token.kind), token.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(TokenKind::Word("x".into()), Span::new(0, 1)),
            Token::new(TokenKind::Pipe, Span::new(2, 3)),
            Token::new(TokenKind::Word("upcase".into()), Span::new(4, 10)),
        ]
    }

    #[test]
    fn test_stream_navigation() {
        let tokens = tokens();
        let mut stream = TokenStream::new(&tokens);
        assert!(matches!(stream.kind(), TokenKind::Word(w) if w == "x"));
        assert!(stream.peek().kind.is(&TokenKind::Pipe));
        stream.advance();
        assert!(stream.eat(&TokenKind::Pipe));
        assert!(stream.eat_word("upcase"));
        assert!(stream.at_end());
        assert_eq!(stream.span(), Span::new(10, 10));
        stream.advance();
        assert!(stream.at_end());
    }

    #[test]
    fn test_expect_reports_found_token() {
        let tokens = tokens();
        let mut stream = TokenStream::new(&tokens);
        let err = stream.expect(&TokenKind::Colon).unwrap_err();
        assert_eq!(err.span(), Some(Span::new(0, 1)));
        assert!(err.to_string().contains("expected ':', found 'x'"));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(TokenKind::keyword("null"), Some(TokenKind::Nil));
        assert_eq!(TokenKind::keyword("contains"), Some(TokenKind::Contains));
        assert_eq!(TokenKind::keyword("empty"), None);
    }
}
