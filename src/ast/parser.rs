//! Markup parser
//!
//! Turns the lexer's markup tokens into a tree of [`Node`]s in one pass.
//! Block tags parse their bodies until one of their end tags, which they
//! consume. Whitespace control is resolved here, so rendering a content
//! node just writes its text.

use std::sync::Arc;

use crate::error::{LiquidError, Span};
use crate::expression::{
    parse_boolean, parse_filtered, parse_identifier, parse_keyword_arguments, parse_primitive,
    parse_string_or_identifier, BinaryOperator, Expression, LoopExpression,
};
use crate::lexer::{Markup, Token, TokenKind, TokenStream, Whitespace};

use super::{
    AssignNode, BlockNode, BlockTagNode, CaptureNode, CaseNode, ConditionalBlockNode, CycleNode,
    EchoNode, ExtendsNode, ForNode, IfNode, IncludeNode, Node, RenderNode,
};

/// Steps through markup tokens. The last token is always `Markup::Eoi`.
struct MarkupStream<'m> {
    tokens: &'m [Markup],
    pos: usize,
}

impl<'m> MarkupStream<'m> {
    fn current(&self) -> &'m Markup {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// The token before the current one
    fn previous(&self) -> Option<&'m Markup> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// The token after the current one
    fn peek(&self) -> Option<&'m Markup> {
        self.tokens.get(self.pos + 1)
    }
}

pub struct Parser {
    trim: Whitespace,
}

impl Parser {
    /// `trim` applies wherever a template has no whitespace marker
    pub fn new(trim: Whitespace) -> Self {
        let trim = match trim {
            Whitespace::Default => Whitespace::Plus,
            other => other,
        };
        Self { trim }
    }

    pub fn parse(&self, tokens: &[Markup]) -> Result<Vec<Node>, LiquidError> {
        match tokens.last() {
            Some(Markup::Eoi { .. }) => {}
            _ => {
                return Err(LiquidError::syntax(
                    "markup must end with end of input",
                    Span::default(),
                ))
            }
        }

        let mut stream = MarkupStream { tokens, pos: 0 };
        let mut nodes = Vec::new();
        while !matches!(stream.current(), Markup::Eoi { .. }) {
            nodes.push(self.parse_markup(&mut stream)?);
        }
        Ok(nodes)
    }

    /// Parse nodes up to, but not including, one of the `end` tags
    fn parse_block(&self, stream: &mut MarkupStream, end: &[&str]) -> Result<BlockNode, LiquidError> {
        let start = stream.current().span().start;
        let mut nodes = Vec::new();

        loop {
            let markup = stream.current();
            if let Markup::Eoi { span } = markup {
                return Err(LiquidError::syntax(
                    format!("expected {}, found end of template", expected(end)),
                    *span,
                ));
            }
            if end.iter().any(|name| markup.is_tag(name)) {
                break;
            }
            nodes.push(self.parse_markup(stream)?);
        }

        let stop = stream.current().span().start;
        Ok(BlockNode::new(Span::new(start, stop), nodes))
    }

    fn parse_markup(&self, stream: &mut MarkupStream) -> Result<Node, LiquidError> {
        let markup = stream.current();
        let node = match markup {
            Markup::Content { span, text } => {
                let left = stream
                    .previous()
                    .map(Markup::right_wc)
                    .unwrap_or(Whitespace::Default);
                let right = stream
                    .peek()
                    .map(Markup::left_wc)
                    .unwrap_or(Whitespace::Default);
                Node::Content {
                    span: *span,
                    text: trim(text, self.resolve(left), self.resolve(right)).to_string(),
                }
            }
            Markup::Raw { span, wc, text } => {
                let left = default_to_plus(wc[1]);
                let right = default_to_plus(wc[2]);
                Node::Raw {
                    span: *span,
                    text: trim(text, left, right).to_string(),
                }
            }
            Markup::Comment { span, text, .. } => Node::Comment {
                span: *span,
                text: text.clone(),
            },
            Markup::Output {
                span, expression, ..
            } => {
                let mut tokens = TokenStream::new(expression);
                let expression = parse_filtered(&mut tokens)?;
                tokens.expect_eoi()?;
                Node::Output {
                    span: *span,
                    expression,
                }
            }
            Markup::Lines {
                span, statements, ..
            } => {
                let mut lines = statements.clone();
                lines.push(Markup::Eoi {
                    span: Span::new(span.end, span.end),
                });
                let nodes = self.parse(&lines)?;
                Node::Liquid {
                    span: *span,
                    block: BlockNode::new(*span, nodes),
                }
            }
            Markup::Tag {
                span,
                name,
                expression,
                ..
            } => {
                stream.advance();
                return self.parse_tag(stream, *span, name, expression);
            }
            Markup::Eoi { span } => {
                return Err(LiquidError::syntax("unexpected end of template", *span))
            }
        };

        stream.advance();
        Ok(node)
    }

    fn resolve(&self, wc: Whitespace) -> Whitespace {
        match wc {
            Whitespace::Default => self.trim,
            other => other,
        }
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Parse a tag whose markup has already been consumed
    fn parse_tag(
        &self,
        stream: &mut MarkupStream,
        span: Span,
        name: &str,
        expression: &[Token],
    ) -> Result<Node, LiquidError> {
        let mut tokens = TokenStream::new(expression);
        let tokens = &mut tokens;

        let node = match name {
            "if" => Node::If(self.parse_if(stream, tokens, span, "endif")?),
            "unless" => Node::Unless(self.parse_if(stream, tokens, span, "endunless")?),
            "case" => Node::Case(self.parse_case(stream, tokens, span)?),
            "for" => {
                let expression = LoopExpression::parse(tokens)?;
                let block = self.parse_block(stream, &["else", "endfor"])?;
                let default = self.parse_else(stream, "endfor")?;
                expect_end(stream, "endfor")?;
                Node::For(ForNode {
                    span,
                    expression,
                    block,
                    default,
                })
            }
            "break" => {
                tokens.expect_eoi()?;
                Node::Break { span }
            }
            "continue" => {
                tokens.expect_eoi()?;
                Node::Continue { span }
            }
            "assign" => {
                let (name, _) = parse_identifier(&tokens.next_token())?;
                tokens.expect(&TokenKind::Assign)?;
                let expression = parse_filtered(tokens)?;
                tokens.expect_eoi()?;
                Node::Assign(AssignNode {
                    span,
                    name,
                    expression,
                })
            }
            "capture" => {
                let (name, _) = parse_string_or_identifier(&tokens.next_token())?;
                tokens.expect_eoi()?;
                let block = self.parse_block(stream, &["endcapture"])?;
                expect_end(stream, "endcapture")?;
                Node::Capture(CaptureNode { span, name, block })
            }
            "cycle" => Node::Cycle(parse_cycle(tokens, span)?),
            "increment" | "decrement" => {
                let (counter, _) = parse_identifier(&tokens.next_token())?;
                tokens.expect_eoi()?;
                if name == "increment" {
                    Node::Increment { span, name: counter }
                } else {
                    Node::Decrement { span, name: counter }
                }
            }
            "echo" => {
                let expression = parse_filtered(tokens)?;
                tokens.expect_eoi()?;
                Node::Echo(EchoNode { span, expression })
            }
            "include" => Node::Include(parse_include(tokens, span)?),
            "render" => Node::Render(parse_render(tokens, span)?),
            "extends" => {
                let (name, _) = parse_string_or_identifier(&tokens.next_token())?;
                tokens.expect_eoi()?;
                Node::Extends(ExtendsNode { span, name })
            }
            "block" => Node::Block(self.parse_block_tag(stream, tokens, span)?),
            "else" | "elsif" | "when" | "endif" | "endunless" | "endcase" | "endfor"
            | "endcapture" | "endblock" | "endraw" => {
                return Err(LiquidError::syntax(
                    format!("unexpected tag '{}'", name),
                    span,
                ))
            }
            _ => {
                return Err(LiquidError::syntax(
                    format!("unknown tag '{}'", name),
                    span,
                ))
            }
        };
        Ok(node)
    }

    fn parse_if(
        &self,
        stream: &mut MarkupStream,
        tokens: &mut TokenStream,
        span: Span,
        end: &str,
    ) -> Result<IfNode, LiquidError> {
        let condition = parse_boolean(tokens)?;
        tokens.expect_eoi()?;
        let consequence = self.parse_block(stream, &["elsif", "else", end])?;

        let mut alternatives = Vec::new();
        while let Markup::Tag {
            span, expression, ..
        } = stream.current()
        {
            if !stream.current().is_tag("elsif") {
                break;
            }
            stream.advance();
            let mut tokens = TokenStream::new(expression);
            let expression = parse_boolean(&mut tokens)?;
            tokens.expect_eoi()?;
            let block = self.parse_block(stream, &["elsif", "else", end])?;
            alternatives.push(ConditionalBlockNode {
                span: *span,
                expression,
                block,
            });
        }

        let default = self.parse_else(stream, end)?;
        expect_end(stream, end)?;
        Ok(IfNode {
            span,
            condition,
            consequence,
            alternatives,
            default,
        })
    }

    /// An optional `{% else %}` block, ending at `end`
    fn parse_else(&self, stream: &mut MarkupStream, end: &str) -> Result<Option<BlockNode>, LiquidError> {
        let markup = stream.current();
        if !markup.is_tag("else") {
            return Ok(None);
        }
        if let Markup::Tag { expression, .. } = markup {
            TokenStream::new(expression).expect_eoi()?;
        }
        stream.advance();
        self.parse_block(stream, &[end]).map(Some)
    }

    fn parse_case(
        &self,
        stream: &mut MarkupStream,
        tokens: &mut TokenStream,
        span: Span,
    ) -> Result<CaseNode, LiquidError> {
        let subject = parse_primitive(&tokens.next_token())?;
        tokens.expect_eoi()?;

        // Only whitespace and comments may come before the first `when`
        loop {
            match stream.current() {
                Markup::Content { text, .. } if text.trim().is_empty() => stream.advance(),
                Markup::Comment { .. } => stream.advance(),
                markup if ["when", "else", "endcase"].iter().any(|t| markup.is_tag(t)) => break,
                markup => {
                    return Err(LiquidError::syntax(
                        "expected 'when', 'else' or 'endcase'",
                        markup.span(),
                    ))
                }
            }
        }

        let mut whens = Vec::new();
        while let Markup::Tag {
            span, expression, ..
        } = stream.current()
        {
            if !stream.current().is_tag("when") {
                break;
            }
            stream.advance();
            let expression = parse_when(&subject, expression, *span)?;
            let block = self.parse_block(stream, &["when", "else", "endcase"])?;
            whens.push(ConditionalBlockNode {
                span: *span,
                expression,
                block,
            });
        }

        let default = self.parse_else(stream, "endcase")?;
        expect_end(stream, "endcase")?;
        Ok(CaseNode {
            span,
            whens,
            default,
        })
    }

    fn parse_block_tag(
        &self,
        stream: &mut MarkupStream,
        tokens: &mut TokenStream,
        span: Span,
    ) -> Result<BlockTagNode, LiquidError> {
        let (name, _) = parse_string_or_identifier(&tokens.next_token())?;
        let required = tokens.eat(&TokenKind::Required);
        tokens.expect_eoi()?;

        let body = self.parse_block(stream, &["endblock"])?;
        if let Markup::Tag {
            span: end_span,
            expression,
            ..
        } = stream.current()
        {
            let mut end_tokens = TokenStream::new(expression);
            if !end_tokens.at_end() {
                let (end_name, _) = parse_string_or_identifier(&end_tokens.next_token())?;
                if end_name != name {
                    return Err(LiquidError::inheritance(
                        format!("expected 'endblock {}', found 'endblock {}'", name, end_name),
                        *end_span,
                    ));
                }
                end_tokens.expect_eoi()?;
            }
        }
        expect_end(stream, "endblock")?;

        Ok(BlockTagNode {
            span,
            name,
            required,
            body: Arc::new(body),
        })
    }
}

fn expect_end(stream: &mut MarkupStream, end: &str) -> Result<(), LiquidError> {
    let markup = stream.current();
    if markup.is_tag(end) {
        stream.advance();
        return Ok(());
    }
    Err(LiquidError::syntax(format!("expected '{}'", end), markup.span()))
}

fn expected(end: &[&str]) -> String {
    end.iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// `when a, b or c` compared against the case subject
fn parse_when(subject: &Expression, tokens: &[Token], span: Span) -> Result<Expression, LiquidError> {
    let mut stream = TokenStream::new(tokens);
    let mut expression: Option<Expression> = None;

    loop {
        let item = parse_primitive(&stream.next_token())?;
        let comparison = Expression::Binary {
            operator: BinaryOperator::Eq,
            left: Box::new(subject.clone()),
            right: Box::new(item),
            span,
        };
        expression = Some(match expression {
            Some(left) => Expression::Binary {
                operator: BinaryOperator::Or,
                left: Box::new(left),
                right: Box::new(comparison),
                span,
            },
            None => comparison,
        });

        if !stream.eat(&TokenKind::Comma) && !stream.eat(&TokenKind::Or) {
            break;
        }
    }

    stream.expect_eoi()?;
    expression.ok_or_else(|| LiquidError::syntax("expected an expression", span))
}

fn parse_cycle(tokens: &mut TokenStream, span: Span) -> Result<CycleNode, LiquidError> {
    let group = if tokens.peek().kind.is(&TokenKind::Colon) {
        let (group, _) = parse_string_or_identifier(&tokens.next_token())?;
        tokens.advance();
        Some(group)
    } else {
        None
    };

    let mut items = Vec::new();
    loop {
        items.push(parse_primitive(&tokens.next_token())?);
        if !tokens.eat(&TokenKind::Comma) {
            break;
        }
    }
    tokens.expect_eoi()?;

    Ok(CycleNode { span, group, items })
}

/// `with x as y` or `for x as y`, returning the variable, alias and whether
/// it was `for`
fn parse_bound_variable(
    tokens: &mut TokenStream,
) -> Result<(Option<Expression>, Option<String>, bool), LiquidError> {
    let looped = matches!(tokens.kind(), TokenKind::For);
    let bound = matches!(tokens.kind(), TokenKind::With | TokenKind::For)
        && !matches!(tokens.peek().kind, TokenKind::Colon | TokenKind::Comma);
    if !bound {
        return Ok((None, None, false));
    }

    tokens.advance();
    let var = parse_primitive(&tokens.next_token())?;
    let alias = if tokens.eat(&TokenKind::As) {
        Some(parse_identifier(&tokens.next_token())?.0)
    } else {
        None
    };
    Ok((Some(var), alias, looped))
}

fn parse_include(tokens: &mut TokenStream, span: Span) -> Result<IncludeNode, LiquidError> {
    let name = parse_primitive(&tokens.next_token())?;
    let (var, alias, _) = parse_bound_variable(tokens)?;
    let args = parse_keyword_arguments(tokens)?;
    Ok(IncludeNode {
        span,
        name,
        var,
        alias,
        args,
    })
}

fn parse_render(tokens: &mut TokenStream, span: Span) -> Result<RenderNode, LiquidError> {
    let token = tokens.next_token();
    let name = match token.kind {
        TokenKind::String(name) => name,
        other => {
            return Err(LiquidError::syntax(
                format!("expected the name of a template as a string, found '{}'", other),
                token.span,
            ))
        }
    };

    let (var, alias, looped) = parse_bound_variable(tokens)?;
    let args = parse_keyword_arguments(tokens)?;
    Ok(RenderNode {
        span,
        name,
        var,
        alias,
        looped,
        args,
    })
}

// ============================================================================
// Whitespace control
// ============================================================================

fn default_to_plus(wc: Whitespace) -> Whitespace {
    match wc {
        Whitespace::Default => Whitespace::Plus,
        other => other,
    }
}

/// Apply resolved whitespace markers to both ends of `text`
fn trim(text: &str, left: Whitespace, right: Whitespace) -> &str {
    const NEWLINES: &[char] = &['\r', '\n'];

    let text = match left {
        Whitespace::Minus => text.trim_start(),
        Whitespace::Smart => text.trim_start_matches(NEWLINES),
        _ => text,
    };
    match right {
        Whitespace::Minus => text.trim_end(),
        Whitespace::Smart => text.trim_end_matches(NEWLINES),
        _ => text,
    }
}
