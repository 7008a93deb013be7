//! Tags that write variables or output a single value

use crate::context::{OutputBuffer, RenderContext};
use crate::error::{LiquidError, Span};
use crate::expression::Expression;
use crate::value::Value;

use super::{BlockNode, Flow};

/// `{% assign name = expression %}`
#[derive(Debug, Clone, PartialEq)]
pub struct AssignNode {
    pub span: Span,
    pub name: String,
    pub expression: Expression,
}

impl AssignNode {
    pub fn render(&self, context: &mut RenderContext) -> Result<Flow, LiquidError> {
        let value = self.expression.evaluate(context)?;
        context.assign(self.name.as_str(), value)?;
        Ok(Flow::Rendered(0))
    }
}

/// `{% capture name %}...{% endcapture %}`
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureNode {
    pub span: Span,
    pub name: String,
    pub block: BlockNode,
}

impl CaptureNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let mut captured = buffer.capture();
        let flow = self.block.render(context, &mut captured)?;

        let text = captured.into_string();
        let value = if context.auto_escape() {
            Value::Markup(text)
        } else {
            Value::String(text)
        };
        context.assign(self.name.as_str(), value)?;

        Ok(match flow {
            Flow::Rendered(_) => Flow::Rendered(0),
            interrupt => interrupt,
        })
    }
}

/// `{% cycle 'a', 'b' %}` or `{% cycle group: 'a', 'b' %}`
#[derive(Debug, Clone, PartialEq)]
pub struct CycleNode {
    pub span: Span,
    pub group: Option<String>,
    pub items: Vec<Expression>,
}

impl CycleNode {
    /// Cycles without a group name share state when their items are the same
    pub fn key(&self) -> String {
        match &self.group {
            Some(group) => group.clone(),
            None => self
                .items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let index = context.cycle(&self.key(), self.items.len());
        let item = match self.items.get(index) {
            Some(item) => item,
            None => return Ok(Flow::Rendered(0)),
        };
        let text = item
            .evaluate(context)?
            .to_liquid_string(context.auto_escape())?;
        Ok(Flow::Rendered(buffer.write(&text)?))
    }
}

/// `{% echo expression %}`
#[derive(Debug, Clone, PartialEq)]
pub struct EchoNode {
    pub span: Span,
    pub expression: Expression,
}

impl EchoNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let text = self
            .expression
            .evaluate(context)?
            .to_liquid_string(context.auto_escape())?;
        Ok(Flow::Rendered(buffer.write(&text)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EnvironmentConfig;
    use crate::environment::Environment;
    use crate::error::{LiquidError, ResourceLimit};
    use crate::undefined::UndefinedStrategy;
    use serde_json::json;
    use std::sync::Arc;

    fn render(source: &str, data: serde_json::Value) -> Result<String, LiquidError> {
        let env = Arc::new(Environment::new());
        env.from_string(source)?.render(&data)
    }

    #[test]
    fn test_assign() {
        let source = "{% assign x = 'hello' | upcase %}{{ x }}";
        assert_eq!(render(source, json!({})).unwrap(), "HELLO");
    }

    #[test]
    fn test_assign_shadows_data() {
        let source = "{{ x }}{% assign x = 2 %}{{ x }}";
        assert_eq!(render(source, json!({"x": 1})).unwrap(), "12");
    }

    #[test]
    fn test_assign_range_size() {
        let source = "{% assign r = (a..b) %}{{ r.size }} {{ r | size }} {{ r.first }}";
        let data = json!({"a": i64::MIN, "b": i64::MAX});
        assert_eq!(
            render(source, data).unwrap(),
            "9223372036854775807 9223372036854775807 -9223372036854775808"
        );
    }

    #[test]
    fn test_default_under_strict_strategies() {
        let strict = |undefined| {
            Arc::new(Environment::with_config(EnvironmentConfig {
                undefined,
                ..Default::default()
            }))
        };

        let env = strict(UndefinedStrategy::StrictDefault);
        let output = env.from_string("{{ x | default: 'z' }}").unwrap().render(&json!({}));
        assert_eq!(output.unwrap(), "z");
        let err = env.from_string("{{ x }}").unwrap().render(&json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Undefined(_)));
        let err = env.from_string("{{ x | upcase }}").unwrap().render(&json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Undefined(_)));

        let env = strict(UndefinedStrategy::Strict);
        let err = env
            .from_string("{{ x | default: 'z' }}")
            .unwrap()
            .render(&json!({}))
            .unwrap_err();
        assert!(matches!(err, LiquidError::Undefined(_)));
        let output = env.from_string("{{ x | default: 'z' }}").unwrap().render(&json!({"x": 1}));
        assert_eq!(output.unwrap(), "1");
    }

    #[test]
    fn test_capture() {
        let source = "{% capture greeting %}Hello, {{ name }}{% endcapture %}[{{ greeting }}]";
        assert_eq!(render(source, json!({"name": "you"})).unwrap(), "[Hello, you]");
    }

    #[test]
    fn test_cycle() {
        let source = "{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "abca");
    }

    #[test]
    fn test_cycle_groups() {
        let source = "{% cycle x: 'a', 'b' %}{% cycle y: 'a', 'b' %}{% cycle x: 'a', 'b' %}";
        assert_eq!(render(source, json!({})).unwrap(), "aab");
    }

    #[test]
    fn test_increment_and_decrement() {
        let source = "{% increment n %}{% increment n %}{% decrement n %}{% decrement m %}";
        assert_eq!(render(source, json!({})).unwrap(), "011-1");
    }

    #[test]
    fn test_counters_are_separate_from_assign() {
        let source = "{% assign n = 10 %}{% increment n %}{{ n }}";
        assert_eq!(render(source, json!({})).unwrap(), "010");
    }

    #[test]
    fn test_echo() {
        assert_eq!(
            render("{% echo 'x' | append: y %}", json!({"y": "z"})).unwrap(),
            "xz"
        );
    }

    #[test]
    fn test_liquid_tag() {
        let source = "{% liquid\n  assign x = 'a'\n  # a comment\n  if x == 'a'\n    echo 'yes'\n  endif\n%}";
        assert_eq!(render(source, json!({})).unwrap(), "yes");
    }

    #[test]
    fn test_output_stream_limit() {
        let env = Arc::new(Environment::with_config(EnvironmentConfig {
            output_stream_limit: Some(5),
            ..Default::default()
        }));
        let template = env.from_string("{{ x }}{{ x }}").unwrap();
        assert_eq!(template.render(&json!({"x": "ab"})).unwrap(), "abab");
        let err = template.render(&json!({"x": "abc"})).unwrap_err();
        assert!(matches!(
            err,
            LiquidError::ResourceLimit {
                kind: ResourceLimit::OutputStream,
                ..
            }
        ));
    }

    #[test]
    fn test_capture_shares_output_limit() {
        let env = Arc::new(Environment::with_config(EnvironmentConfig {
            output_stream_limit: Some(4),
            ..Default::default()
        }));
        let template = env
            .from_string("ab{% capture c %}{{ x }}{% endcapture %}")
            .unwrap();
        assert!(template.render(&json!({"x": "xyz"})).is_err());
        assert!(template.render(&json!({"x": "xy"})).is_ok());
    }
}
