//! `include` and `render`
//!
//! `include` renders another template in the caller's scope. `render` gives
//! the partial its own scope, seeded only with globals and the tag's
//! arguments, and disables `include` inside it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::context::{Namespace, OutputBuffer, RenderContext};
use crate::error::{LiquidError, Span};
use crate::expression::Expression;
use crate::template::Template;
use crate::value::Value;

use super::iteration::forloop;
use super::Flow;

/// `{% include 'name' [with|for var [as alias]] [key: value, ...] %}`
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeNode {
    pub span: Span,
    /// Evaluated at render time, so the name can come from a variable
    pub name: Expression,
    pub var: Option<Expression>,
    pub alias: Option<String>,
    pub args: Vec<(String, Expression)>,
}

impl IncludeNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let name = self.name.evaluate(context)?.to_liquid_string(false)?;
        let template = load_partial(context, &name, self.span)?;
        let namespace = evaluate_args(&self.args, context)?;
        let key = self
            .alias
            .clone()
            .unwrap_or_else(|| default_key(&template.name));

        context.extend(namespace, Some(Arc::clone(&template)), |ctx| {
            let value = match &self.var {
                Some(var) => var.evaluate(ctx)?,
                None => return template.render_with_context(ctx, buffer, true),
            };

            match value {
                Value::Array(items) => {
                    ctx.push_loop(items.len())?;
                    let result = render_each(ctx, buffer, &template, &key, items);
                    ctx.pop_loop();
                    result
                }
                value => {
                    ctx.set_scoped(key.as_str(), value);
                    template.render_with_context(ctx, buffer, true)
                }
            }
        })
    }
}

fn render_each(
    context: &mut RenderContext,
    buffer: &mut OutputBuffer,
    template: &Template,
    key: &str,
    items: Vec<Value>,
) -> Result<Flow, LiquidError> {
    let mut written = 0;
    for item in items {
        context.set_scoped(key, item);
        match template.render_with_context(context, buffer, true)? {
            Flow::Rendered(n) => written += n,
            interrupt => return Ok(interrupt),
        }
    }
    Ok(Flow::Rendered(written))
}

/// `{% render 'name' [with|for var [as alias]] [key: value, ...] %}`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub span: Span,
    /// Always a string literal
    pub name: String,
    pub var: Option<Expression>,
    pub alias: Option<String>,
    /// True for `for var`, false for `with var`
    pub looped: bool,
    pub args: Vec<(String, Expression)>,
}

impl RenderNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let template = load_partial(context, &self.name, self.span)?;
        let namespace = evaluate_args(&self.args, context)?;
        let key = self
            .alias
            .clone()
            .unwrap_or_else(|| default_key(&template.name));

        let disabled: HashSet<String> = ["include".to_string()].into_iter().collect();
        let mut ctx = context.copy(
            namespace,
            Some(Arc::clone(&template)),
            Some(disabled),
            true,
            false,
        )?;

        let value = match &self.var {
            Some(var) => var.evaluate(context)?,
            None => return template.render_with_context(&mut ctx, buffer, false),
        };

        match value {
            Value::Array(items) if self.looped => {
                let length = items.len();
                let parentloop = context.undefined("parentloop", self.span);
                ctx.push_loop(length)?;

                let mut written = 0;
                for (index, item) in items.into_iter().enumerate() {
                    let mut layer = Namespace::new();
                    layer.insert("forloop".to_string(), forloop(&key, length, index, &parentloop));
                    layer.insert(key.clone(), item);
                    let flow = ctx.extend(layer, None, |ctx| {
                        template.render_with_context(ctx, buffer, false)
                    })?;
                    written += flow.written();
                }
                Ok(Flow::Rendered(written))
            }
            value => {
                let mut layer = Namespace::new();
                layer.insert(key, value);
                ctx.extend(layer, None, |ctx| {
                    template.render_with_context(ctx, buffer, false)
                })
            }
        }
    }
}

fn load_partial(
    context: &RenderContext,
    name: &str,
    span: Span,
) -> Result<Arc<Template>, LiquidError> {
    let env = Arc::clone(&context.env);
    env.get_template(name).map_err(|err| {
        if matches!(err, LiquidError::TemplateNotFound(_)) {
            warn!(template = name, "partial template not found");
        }
        err.or_span(span)
    })
}

fn evaluate_args(
    args: &[(String, Expression)],
    context: &mut RenderContext,
) -> Result<Namespace, LiquidError> {
    let mut namespace = Namespace::new();
    for (name, value) in args {
        namespace.insert(name.clone(), value.evaluate(context)?);
    }
    Ok(namespace)
}

/// `product` for a template named `product.liquid`
fn default_key(template_name: &str) -> String {
    template_name
        .split('.')
        .next()
        .unwrap_or(template_name)
        .to_string()
}
