//! Parsed templates

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::{Flow, Node};
use crate::context::{Namespace, OutputBuffer, RenderContext};
use crate::environment::Environment;
use crate::error::{LiquidError, Span};
use crate::value::Value;

/// A parsed template, bound to the environment that loaded it
#[derive(Clone)]
pub struct Template {
    pub env: Arc<Environment>,
    pub name: String,
    /// Where the template was read from, for file system templates
    pub path: Option<PathBuf>,
    pub source: Arc<str>,
    pub nodes: Arc<Vec<Node>>,
    /// Variables available to this template, over environment globals
    pub globals: Arc<Namespace>,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Template {
    pub fn new(
        env: Arc<Environment>,
        name: impl Into<String>,
        path: Option<PathBuf>,
        source: Arc<str>,
        nodes: Arc<Vec<Node>>,
    ) -> Self {
        Self {
            env,
            name: name.into(),
            path,
            source,
            nodes,
            globals: Arc::new(Namespace::new()),
        }
    }

    pub fn with_globals(mut self, globals: Namespace) -> Self {
        self.globals = Arc::new(globals);
        self
    }

    /// Render with `data`, any value that serializes to a map
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, LiquidError> {
        let mut context = RenderContext::new(Arc::new(self.clone()), self.namespace(data)?);
        let mut buffer = OutputBuffer::new(self.env.config.output_stream_limit);
        self.render_with_context(&mut context, &mut buffer, false)?;
        Ok(buffer.into_string())
    }

    pub async fn render_async<T: Serialize + ?Sized>(
        &self,
        data: &T,
    ) -> Result<String, LiquidError> {
        let mut context = RenderContext::new(Arc::new(self.clone()), self.namespace(data)?);
        let mut buffer = OutputBuffer::new(self.env.config.output_stream_limit);
        self.render_with_context_async(&mut context, &mut buffer, false)
            .await?;
        Ok(buffer.into_string())
    }

    fn namespace<T: Serialize + ?Sized>(&self, data: &T) -> Result<Namespace, LiquidError> {
        match Value::from_serialize(data)? {
            Value::Object(map) => Ok(map),
            Value::Nil => Ok(Namespace::new()),
            other => Err(LiquidError::type_error(
                format!("render data must be a mapping, found {}", other.type_name()),
                Span::default(),
            )
            .with_template(&self.name, &self.source)),
        }
    }

    /// Render this template's nodes into `buffer` using an existing context
    ///
    /// A `partial` render, like an included template, passes `break` and
    /// `continue` back to the caller. Anywhere else they are an error.
    pub fn render_with_context(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
        partial: bool,
    ) -> Result<Flow, LiquidError> {
        let mut written = 0;
        for node in self.nodes.iter() {
            let flow = node
                .render(context, buffer)
                .map_err(|e| e.with_template(&self.name, &self.source))?;
            match self.handle_flow(flow, node, partial)? {
                Some(done) => return Ok(done),
                None => written += flow.written(),
            }
        }
        Ok(Flow::Rendered(written))
    }

    pub async fn render_with_context_async(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
        partial: bool,
    ) -> Result<Flow, LiquidError> {
        let mut written = 0;
        for node in self.nodes.iter() {
            let flow = node
                .render_async(context, buffer)
                .await
                .map_err(|e| e.with_template(&self.name, &self.source))?;
            match self.handle_flow(flow, node, partial)? {
                Some(done) => return Ok(done),
                None => written += flow.written(),
            }
        }
        Ok(Flow::Rendered(written))
    }

    /// `Some` if rendering should end here
    fn handle_flow(&self, flow: Flow, node: &Node, partial: bool) -> Result<Option<Flow>, LiquidError> {
        match flow {
            Flow::Rendered(_) => Ok(None),
            Flow::Stop => Ok(Some(Flow::Stop)),
            Flow::Break | Flow::Continue if partial => Ok(Some(flow)),
            Flow::Break | Flow::Continue => {
                let tag = if flow == Flow::Break { "break" } else { "continue" };
                Err(
                    LiquidError::syntax(format!("unexpected '{}'", tag), node.span())
                        .with_template(&self.name, &self.source),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Page {
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_render_struct() {
        let env = Arc::new(Environment::new());
        let template = env
            .from_string("{{ title }}: {{ tags | join: ', ' }}")
            .unwrap();
        let page = Page {
            title: "Hello".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(template.render(&page).unwrap(), "Hello: a, b");
    }

    #[test]
    fn test_render_is_repeatable() {
        let env = Arc::new(Environment::new());
        let template = env
            .from_string("{% increment n %}{% assign x = 1 %}{{ x }}")
            .unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "01");
        assert_eq!(template.render(&json!({})).unwrap(), "01");
    }

    #[test]
    fn test_render_data_must_be_mapping() {
        let env = Arc::new(Environment::new());
        let template = env.from_string("x").unwrap();
        assert_eq!(template.render(&json!(null)).unwrap(), "x");
        assert!(matches!(
            template.render(&json!([1, 2])).unwrap_err(),
            LiquidError::Type(_)
        ));
    }

    #[test]
    fn test_break_outside_loop() {
        let env = Arc::new(Environment::new());
        let template = env.from_string("a{% break %}b").unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
        assert!(err.to_string().contains("unexpected 'break'"));
    }

    #[test]
    fn test_error_line_number() {
        let env = Arc::new(Environment::new());
        let template = env.from_string("one\ntwo\n{{ 1 | divided_by: 0 }}").unwrap();
        let err = template.render(&json!({})).unwrap_err();
        let detail = err.detail().unwrap();
        assert_eq!(detail.template.as_deref(), Some("<string>"));
        assert_eq!(detail.line, Some(3));
    }

    #[tokio::test]
    async fn test_render_async() {
        let env = Arc::new(Environment::new());
        let template = env
            .from_string("{% for x in (1..3) %}{{ x }}{% endfor %}")
            .unwrap();
        assert_eq!(template.render_async(&json!({})).await.unwrap(), "123");
    }
}
