//! Template syntax tree
//!
//! A parsed template is a list of [`Node`]s. Rendering a node writes to an
//! [`OutputBuffer`] and returns a [`Flow`], which is how `break`, `continue`
//! and `extends` unwind the tree without using errors.

pub mod control;
pub mod inheritance;
pub mod iteration;
mod parser;
pub mod partials;
pub mod variables;

use crate::context::{OutputBuffer, RenderContext};
use crate::error::{ErrorDetail, LiquidError, Span};
use crate::expression::Expression;

pub use control::{CaseNode, IfNode};
pub use inheritance::{BlockTagNode, ExtendsNode};
pub use iteration::ForNode;
pub use parser::Parser;
pub use partials::{IncludeNode, RenderNode};
pub use variables::{AssignNode, CaptureNode, CycleNode, EchoNode};

// ============================================================================
// Flow
// ============================================================================

/// How rendering a node ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Done, having written this many bytes
    Rendered(usize),
    /// `{% break %}`, unwinding to the nearest `for`
    Break,
    /// `{% continue %}`, unwinding to the nearest `for`
    Continue,
    /// Stop rendering this template, after `extends`
    Stop,
}

impl Flow {
    /// Bytes written, or zero for an interrupt
    pub fn written(self) -> usize {
        match self {
            Flow::Rendered(n) => n,
            _ => 0,
        }
    }
}

// ============================================================================
// Blocks
// ============================================================================

/// A sequence of nodes, like the body of a block tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockNode {
    pub span: Span,
    pub nodes: Vec<Node>,
}

impl BlockNode {
    pub fn new(span: Span, nodes: Vec<Node>) -> Self {
        Self { span, nodes }
    }

    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let mut written = 0;
        for node in &self.nodes {
            match node.render(context, buffer)? {
                Flow::Rendered(n) => written += n,
                interrupt => return Ok(interrupt),
            }
        }
        Ok(Flow::Rendered(written))
    }

    pub async fn render_async(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        self.render(context, buffer)
    }
}

/// A block guarded by an expression, like `elsif` or `when`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBlockNode {
    pub span: Span,
    pub expression: Expression,
    pub block: BlockNode,
}

impl ConditionalBlockNode {
    /// Render the block if the expression is truthy
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Option<Flow>, LiquidError> {
        if self.expression.is_satisfied(context)? {
            self.block.render(context, buffer).map(Some)
        } else {
            Ok(None)
        }
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Template text, already trimmed
    Content { span: Span, text: String },
    /// `{{ expression }}`
    Output { span: Span, expression: Expression },
    Raw { span: Span, text: String },
    Comment { span: Span, text: String },
    Assign(AssignNode),
    Capture(CaptureNode),
    Case(CaseNode),
    Cycle(CycleNode),
    Decrement { span: Span, name: String },
    Increment { span: Span, name: String },
    Echo(EchoNode),
    For(ForNode),
    Break { span: Span },
    Continue { span: Span },
    If(IfNode),
    Unless(IfNode),
    Include(IncludeNode),
    Render(RenderNode),
    /// `{% liquid %}` line statements
    Liquid { span: Span, block: BlockNode },
    Extends(ExtendsNode),
    Block(BlockTagNode),
}

impl Node {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        if let Some(tag) = self.tag_name() {
            if context.disabled_tags.contains(tag) {
                return Err(LiquidError::DisabledTag(ErrorDetail::new(
                    format!("{} usage is not allowed in this context", tag),
                    Some(self.span()),
                )));
            }
        }

        match self {
            Node::Content { text, .. } | Node::Raw { text, .. } => {
                Ok(Flow::Rendered(buffer.write(text)?))
            }
            Node::Output { expression, .. } => {
                let value = expression.evaluate(context)?;
                let text = value.to_liquid_string(context.auto_escape())?;
                Ok(Flow::Rendered(buffer.write(&text)?))
            }
            Node::Comment { .. } => Ok(Flow::Rendered(0)),
            Node::Assign(node) => node.render(context),
            Node::Capture(node) => node.render(context, buffer),
            Node::Case(node) => node.render(context, buffer),
            Node::Cycle(node) => node.render(context, buffer),
            Node::Decrement { name, .. } => {
                let value = context.decrement(name);
                Ok(Flow::Rendered(buffer.write(&value.to_string())?))
            }
            Node::Increment { name, .. } => {
                let value = context.increment(name);
                Ok(Flow::Rendered(buffer.write(&value.to_string())?))
            }
            Node::Echo(node) => node.render(context, buffer),
            Node::For(node) => node.render(context, buffer),
            Node::Break { .. } => Ok(Flow::Break),
            Node::Continue { .. } => Ok(Flow::Continue),
            Node::If(node) => node.render(context, buffer, false),
            Node::Unless(node) => node.render(context, buffer, true),
            Node::Include(node) => node.render(context, buffer),
            Node::Render(node) => node.render(context, buffer),
            Node::Liquid { block, .. } => block.render(context, buffer),
            Node::Extends(node) => node.render(context, buffer),
            Node::Block(node) => node.render(context, buffer),
        }
    }

    pub async fn render_async(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        self.render(context, buffer)
    }

    /// Name of the tag this node came from, if any
    pub fn tag_name(&self) -> Option<&'static str> {
        let name = match self {
            Node::Content { .. } | Node::Output { .. } | Node::Comment { .. } => return None,
            Node::Raw { .. } => "raw",
            Node::Assign(_) => "assign",
            Node::Capture(_) => "capture",
            Node::Case(_) => "case",
            Node::Cycle(_) => "cycle",
            Node::Decrement { .. } => "decrement",
            Node::Increment { .. } => "increment",
            Node::Echo(_) => "echo",
            Node::For(_) => "for",
            Node::Break { .. } => "break",
            Node::Continue { .. } => "continue",
            Node::If(_) => "if",
            Node::Unless(_) => "unless",
            Node::Include(_) => "include",
            Node::Render(_) => "render",
            Node::Liquid { .. } => "liquid",
            Node::Extends(_) => "extends",
            Node::Block(_) => "block",
        };
        Some(name)
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Content { span, .. }
            | Node::Output { span, .. }
            | Node::Raw { span, .. }
            | Node::Comment { span, .. }
            | Node::Decrement { span, .. }
            | Node::Increment { span, .. }
            | Node::Break { span }
            | Node::Continue { span }
            | Node::Liquid { span, .. } => *span,
            Node::Assign(node) => node.span,
            Node::Capture(node) => node.span,
            Node::Case(node) => node.span,
            Node::Cycle(node) => node.span,
            Node::Echo(node) => node.span,
            Node::For(node) => node.span,
            Node::If(node) | Node::Unless(node) => node.span,
            Node::Include(node) => node.span,
            Node::Render(node) => node.span,
            Node::Extends(node) => node.span,
            Node::Block(node) => node.span,
        }
    }

    /// Nodes nested directly inside this one
    pub fn children(&self) -> Vec<&Node> {
        let blocks: Vec<&BlockNode> = match self {
            Node::Capture(node) => vec![&node.block],
            Node::Case(node) => node
                .whens
                .iter()
                .map(|when| &when.block)
                .chain(node.default.iter())
                .collect(),
            Node::For(node) => std::iter::once(&node.block)
                .chain(node.default.iter())
                .collect(),
            Node::If(node) | Node::Unless(node) => std::iter::once(&node.consequence)
                .chain(node.alternatives.iter().map(|alt| &alt.block))
                .chain(node.default.iter())
                .collect(),
            Node::Liquid { block, .. } => vec![block],
            Node::Block(node) => vec![node.body.as_ref()],
            _ => Vec::new(),
        };
        blocks.into_iter().flat_map(|block| block.nodes.iter()).collect()
    }

    /// Expressions used directly by this node
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Node::Output { expression, .. } => vec![expression],
            Node::Assign(node) => vec![&node.expression],
            Node::Case(node) => node.whens.iter().map(|when| &when.expression).collect(),
            Node::Cycle(node) => node.items.iter().collect(),
            Node::Echo(node) => vec![&node.expression],
            Node::For(node) => node.expression.children(),
            Node::If(node) | Node::Unless(node) => std::iter::once(&node.condition)
                .chain(node.alternatives.iter().map(|alt| &alt.expression))
                .collect(),
            Node::Include(node) => {
                let mut exprs = vec![&node.name];
                exprs.extend(node.var.iter());
                exprs.extend(node.args.iter().map(|(_, value)| value));
                exprs
            }
            Node::Render(node) => {
                let mut exprs: Vec<&Expression> = node.var.iter().collect();
                exprs.extend(node.args.iter().map(|(_, value)| value));
                exprs
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use serde_json::json;
    use std::sync::Arc;

    fn render(source: &str, data: serde_json::Value) -> Result<String, LiquidError> {
        let env = Arc::new(Environment::new());
        env.from_string(source)?.render(&data)
    }

    #[test]
    fn test_flow_written() {
        assert_eq!(Flow::Rendered(3).written(), 3);
        assert_eq!(Flow::Break.written(), 0);
    }

    #[test]
    fn test_output_and_content() {
        assert_eq!(
            render("Hello, {{ you }}!", json!({"you": "World"})).unwrap(),
            "Hello, World!"
        );
        assert_eq!(render("{{ nosuchthing }}", json!({})).unwrap(), "");
        assert_eq!(render("{{ a }}", json!({"a": [1, 2, "x"]})).unwrap(), "12x");
    }

    #[test]
    fn test_raw_and_comment() {
        assert_eq!(
            render("{% raw %}{{ x }}{% endraw %}{# note #}!", json!({"x": 1})).unwrap(),
            "{{ x }}!"
        );
    }

    #[test]
    fn test_children() {
        let env = Arc::new(Environment::new());
        let template = env
            .from_string("{% if x %}{{ a }}{% else %}{{ b }}{% endif %}")
            .unwrap();
        let node = &template.nodes[0];
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.expressions().len(), 1);
        assert_eq!(node.tag_name(), Some("if"));
    }
}
