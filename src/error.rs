//! Template parsing and rendering errors

use std::fmt;
use thiserror::Error;

/// Byte offsets of a token in its template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Extend this span to cover `other`
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-based line number of the start of this span
    pub fn line_number(&self, source: &str) -> usize {
        let end = self.start.min(source.len());
        source
            .as_bytes()
            .iter()
            .take(end)
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }
}

/// Message and source location carried by every error variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetail {
    pub message: String,
    pub span: Option<Span>,
    pub template: Option<String>,
    pub line: Option<usize>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
            template: None,
            line: None,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.template, self.line) {
            (Some(name), Some(line)) => write!(f, " ('{}', line {})", name, line),
            (None, Some(line)) => write!(f, " (line {})", line),
            (Some(name), None) => write!(f, " ('{}')", name),
            (None, None) => Ok(()),
        }
    }
}

/// Which resource limit was exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimit {
    ContextDepth,
    LoopIterations,
    OutputStream,
    LocalNamespace,
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceLimit::ContextDepth => "context depth limit reached",
            ResourceLimit::LoopIterations => "loop iteration limit reached",
            ResourceLimit::OutputStream => "output stream limit reached",
            ResourceLimit::LocalNamespace => "local namespace limit reached",
        };
        f.write_str(name)
    }
}

/// Liquid template errors
#[derive(Error, Debug)]
pub enum LiquidError {
    #[error("syntax error: {0}")]
    Syntax(ErrorDetail),

    #[error("type error: {0}")]
    Type(ErrorDetail),

    #[error("name error: {0}")]
    Name(ErrorDetail),

    #[error("filter argument error: {0}")]
    FilterArgument(ErrorDetail),

    #[error("undefined error: {0}")]
    Undefined(ErrorDetail),

    #[error("template inheritance error: {0}")]
    TemplateInheritance(ErrorDetail),

    #[error("template not found: {0}")]
    TemplateNotFound(ErrorDetail),

    #[error("{kind}: {detail}")]
    ResourceLimit {
        kind: ResourceLimit,
        detail: ErrorDetail,
    },

    #[error("recursion error: {0}")]
    QueryRecursion(ErrorDetail),

    #[error("disabled tag: {0}")]
    DisabledTag(ErrorDetail),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LiquidError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        LiquidError::Syntax(ErrorDetail::new(message, Some(span)))
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        LiquidError::Type(ErrorDetail::new(message, Some(span)))
    }

    pub fn name(message: impl Into<String>, span: Span) -> Self {
        LiquidError::Name(ErrorDetail::new(message, Some(span)))
    }

    pub fn undefined(message: impl Into<String>, span: Option<Span>) -> Self {
        LiquidError::Undefined(ErrorDetail::new(message, span))
    }

    pub fn inheritance(message: impl Into<String>, span: Span) -> Self {
        LiquidError::TemplateInheritance(ErrorDetail::new(message, Some(span)))
    }

    pub fn not_found(name: &str, span: Option<Span>) -> Self {
        LiquidError::TemplateNotFound(ErrorDetail::new(name, span))
    }

    pub fn limit(kind: ResourceLimit, message: impl Into<String>, span: Option<Span>) -> Self {
        LiquidError::ResourceLimit {
            kind,
            detail: ErrorDetail::new(message, span),
        }
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            LiquidError::Syntax(d)
            | LiquidError::Type(d)
            | LiquidError::Name(d)
            | LiquidError::FilterArgument(d)
            | LiquidError::Undefined(d)
            | LiquidError::TemplateInheritance(d)
            | LiquidError::TemplateNotFound(d)
            | LiquidError::QueryRecursion(d)
            | LiquidError::DisabledTag(d) => Some(d),
            LiquidError::ResourceLimit { detail, .. } => Some(detail),
            LiquidError::Io(_) => None,
        }
    }

    fn detail_mut(&mut self) -> Option<&mut ErrorDetail> {
        match self {
            LiquidError::Syntax(d)
            | LiquidError::Type(d)
            | LiquidError::Name(d)
            | LiquidError::FilterArgument(d)
            | LiquidError::Undefined(d)
            | LiquidError::TemplateInheritance(d)
            | LiquidError::TemplateNotFound(d)
            | LiquidError::QueryRecursion(d)
            | LiquidError::DisabledTag(d) => Some(d),
            LiquidError::ResourceLimit { detail, .. } => Some(detail),
            LiquidError::Io(_) => None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        self.detail().and_then(|d| d.span)
    }

    /// Set the span if the error does not have one yet
    pub fn or_span(mut self, span: Span) -> Self {
        if let Some(detail) = self.detail_mut() {
            if detail.span.is_none() {
                detail.span = Some(span);
            }
        }
        self
    }

    /// Attribute this error to a template, unless an inner template already claimed it
    pub fn with_template(mut self, name: &str, source: &str) -> Self {
        if let Some(detail) = self.detail_mut() {
            if detail.template.is_none() {
                detail.template = Some(name.to_string());
                detail.line = detail.span.map(|s| s.line_number(source));
            }
        }
        self
    }

    pub fn is_resource_limit(&self) -> bool {
        matches!(self, LiquidError::ResourceLimit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_number() {
        let source = "a\nb\n{{ c }}";
        assert_eq!(Span::new(0, 1).line_number(source), 1);
        assert_eq!(Span::new(4, 11).line_number(source), 3);
    }

    #[test]
    fn test_with_template_keeps_innermost() {
        let err = LiquidError::syntax("unexpected 'x'", Span::new(2, 3))
            .with_template("inner", "a\nb")
            .with_template("outer", "");
        let detail = err.detail().unwrap();
        assert_eq!(detail.template.as_deref(), Some("inner"));
        assert_eq!(detail.line, Some(2));
        assert_eq!(
            err.to_string(),
            "syntax error: unexpected 'x' ('inner', line 2)"
        );
    }

    #[test]
    fn test_resource_limit_display() {
        let err = LiquidError::limit(ResourceLimit::ContextDepth, "possible recursive include", None);
        assert!(err.is_resource_limit());
        assert_eq!(
            err.to_string(),
            "context depth limit reached: possible recursive include"
        );
    }
}
