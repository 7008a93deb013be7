//! Template inheritance with `extends` and `block`
//!
//! Rendering `{% extends 'base' %}` walks from the extending template up to
//! its base, pushing every `block` it finds onto a per-name stack. Stack
//! items live in one arena and refer to the item they override by index,
//! most derived template first. The base template is then rendered with
//! the same context, and each `block` in it renders the item at the top of
//! its stack.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::context::{block_object, Namespace, OutputBuffer, RenderContext};
use crate::error::{LiquidError, Span};
use crate::template::Template;

use super::{BlockNode, Flow, Node};

// ============================================================================
// Nodes
// ============================================================================

/// `{% extends 'name' %}`
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendsNode {
    pub span: Span,
    pub name: String,
}

impl ExtendsNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let template = Arc::clone(&context.template);
        let (base, stacks) = build_block_stacks(context, &template, &self.name, self.span)?;

        let previous = std::mem::replace(&mut context.block_stacks, Arc::new(stacks));
        let result = base.render_with_context(context, buffer, false);
        context.block_stacks = previous;

        result?;
        Ok(Flow::Stop)
    }
}

/// `{% block name [required] %}...{% endblock [name] %}`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTagNode {
    pub span: Span,
    pub name: String,
    pub required: bool,
    pub body: Arc<BlockNode>,
}

impl BlockTagNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let stacks = Arc::clone(&context.block_stacks);
        let item = match stacks.top(&self.name) {
            Some(item) => item,
            None => return self.render_own(context, buffer),
        };

        if item.required {
            return Err(self
                .must_be_overridden()
                .with_template(&item.source_name, &item.template.source));
        }

        let mut namespace = Namespace::new();
        namespace.insert("block".to_string(), block_object(&self.name));
        let mut ctx = context.copy(
            namespace,
            Some(Arc::clone(&item.template)),
            None,
            true,
            true,
        )?;
        ctx.block_frame = Some(BlockFrame {
            name: self.name.clone(),
            parent: item.parent,
            limit: buffer.remaining(),
        });

        item.body.render(&mut ctx, buffer)
    }

    /// Render this block's own body, as in a template rendered directly
    fn render_own(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        if self.required {
            return Err(self.must_be_overridden());
        }

        let mut namespace = Namespace::new();
        namespace.insert("block".to_string(), block_object(&self.name));

        let frame = context.block_frame.take();
        let result = context.extend(namespace, None, |ctx| self.body.render(ctx, buffer));
        context.block_frame = frame;
        result
    }

    fn must_be_overridden(&self) -> LiquidError {
        LiquidError::inheritance(
            format!("block '{}' must be overridden", self.name),
            self.span,
        )
    }
}

// ============================================================================
// Block stacks
// ============================================================================

/// One `block` found while walking an inheritance chain
pub struct BlockStackItem {
    pub template: Arc<Template>,
    pub name: String,
    pub required: bool,
    /// Name or path of the template the block was found in
    pub source_name: String,
    pub span: Span,
    pub body: Arc<BlockNode>,
    /// The item this one overrides, for `block.super`
    pub parent: Option<usize>,
}

/// Arena of block stack items, with one stack of indexes per block name
#[derive(Default)]
pub struct BlockStacks {
    pub(crate) items: Vec<BlockStackItem>,
    stacks: HashMap<String, Vec<usize>>,
}

impl BlockStacks {
    /// The most derived item for `name`
    pub fn top(&self, name: &str) -> Option<&BlockStackItem> {
        self.stacks
            .get(name)
            .and_then(|stack| stack.first())
            .and_then(|index| self.items.get(*index))
    }

    fn push(&mut self, template: &Arc<Template>, block: &BlockTagNode) {
        let stack = self.stacks.entry(block.name.clone()).or_default();
        let required = if !stack.is_empty() && !block.required {
            false
        } else {
            block.required
        };

        let index = self.items.len();
        self.items.push(BlockStackItem {
            template: Arc::clone(template),
            name: block.name.clone(),
            required,
            source_name: source_name(template),
            span: block.span,
            body: Arc::clone(&block.body),
            parent: None,
        });

        stack.push(index);
        if stack.len() > 1 {
            let overridden = stack[stack.len() - 2];
            self.items[overridden].parent = Some(index);
        }
    }
}

/// The block being rendered, so `block.super` can find what it overrides
#[derive(Debug, Clone)]
pub struct BlockFrame {
    pub name: String,
    pub parent: Option<usize>,
    /// Output budget left when the block started
    pub limit: Option<usize>,
}

fn source_name(template: &Template) -> String {
    match &template.path {
        Some(path) => path.display().to_string(),
        None => template.name.clone(),
    }
}

/// Stack blocks from `template` and each of its parents
///
/// Returns the base template, the one without an `extends` tag. Circular
/// inheritance is detected here, before anything is rendered.
pub fn build_block_stacks(
    context: &RenderContext,
    template: &Arc<Template>,
    parent_name: &str,
    span: Span,
) -> Result<(Arc<Template>, BlockStacks), LiquidError> {
    let env = Arc::clone(&context.env);
    let mut stacks = BlockStacks::default();
    let mut seen = HashSet::new();

    stack_blocks(&mut stacks, template)?;
    seen.insert(parent_name.to_string());
    let mut parent = env.get_template(parent_name).map_err(|e| e.or_span(span))?;

    while let Some((name, span)) = stack_blocks(&mut stacks, &parent)? {
        if !seen.insert(name.clone()) {
            return Err(
                LiquidError::inheritance(format!("circular extends '{}'", name), span)
                    .with_template(&parent.name, &parent.source),
            );
        }
        let grandparent = env.get_template(&name).map_err(|e| {
            e.or_span(span).with_template(&parent.name, &parent.source)
        })?;
        parent = grandparent;
    }

    debug!(
        template = %template.name,
        base = %parent.name,
        blocks = stacks.items.len(),
        "resolved template inheritance"
    );
    Ok((parent, stacks))
}

/// Push the blocks in `template` onto their stacks, returning the name of
/// the template it extends, if any
fn stack_blocks(
    stacks: &mut BlockStacks,
    template: &Arc<Template>,
) -> Result<Option<(String, Span)>, LiquidError> {
    let mut extends = Vec::new();
    let mut blocks = Vec::new();
    for node in template.nodes.iter() {
        find_inheritance_nodes(node, &mut extends, &mut blocks);
    }

    if let Some(second) = extends.get(1) {
        return Err(
            LiquidError::inheritance("too many 'extends' tags", second.span)
                .with_template(&template.name, &template.source),
        );
    }

    let mut names = HashSet::new();
    for block in &blocks {
        if !names.insert(block.name.as_str()) {
            return Err(
                LiquidError::inheritance(format!("duplicate block '{}'", block.name), block.span)
                    .with_template(&template.name, &template.source),
            );
        }
    }

    for block in &blocks {
        stacks.push(template, block);
    }

    Ok(extends.first().map(|node| (node.name.clone(), node.span)))
}

fn find_inheritance_nodes<'a>(
    node: &'a Node,
    extends: &mut Vec<&'a ExtendsNode>,
    blocks: &mut Vec<&'a BlockTagNode>,
) {
    match node {
        Node::Extends(node) => extends.push(node),
        Node::Block(node) => blocks.push(node),
        _ => {}
    }
    for child in node.children() {
        find_inheritance_nodes(child, extends, blocks);
    }
}
