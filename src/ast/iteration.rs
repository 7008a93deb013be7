//! `for`, `break` and `continue`

use crate::context::{Namespace, OutputBuffer, RenderContext};
use crate::error::{LiquidError, Span};
use crate::expression::LoopExpression;
use crate::value::Value;

use super::{BlockNode, Flow};

#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub span: Span,
    pub expression: LoopExpression,
    pub block: BlockNode,
    pub default: Option<BlockNode>,
}

impl ForNode {
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let items = self.expression.evaluate(context)?;
        if items.is_empty() {
            return match &self.default {
                Some(default) => default.render(context, buffer),
                None => Ok(Flow::Rendered(0)),
            };
        }

        let length = items.len();
        let name = self.expression.stop_index_key();
        let identifier = self.expression.identifier.as_str();
        let parentloop = match context.resolve("forloop") {
            Some(forloop) => forloop.clone(),
            None => context.undefined("parentloop", self.span),
        };

        context.push_loop(length)?;
        let result = context.extend(Namespace::new(), None, |ctx| {
            let mut written = 0;
            for (index, item) in items.into_iter().enumerate() {
                ctx.set_scoped("forloop", forloop(&name, length, index, &parentloop));
                ctx.set_scoped(identifier, item);
                match self.block.render(ctx, buffer)? {
                    Flow::Rendered(n) => written += n,
                    Flow::Continue => continue,
                    Flow::Break => break,
                    Flow::Stop => return Ok(Flow::Stop),
                }
            }
            Ok(Flow::Rendered(written))
        });
        context.pop_loop();
        result
    }
}

/// The `forloop` helper object for iteration `index` of `length`
pub fn forloop(name: &str, length: usize, index: usize, parentloop: &Value) -> Value {
    let mut object = Namespace::new();
    object.insert("name".to_string(), Value::from(name));
    object.insert("length".to_string(), Value::from(length));
    object.insert("index".to_string(), Value::from(index + 1));
    object.insert("index0".to_string(), Value::from(index));
    object.insert("rindex".to_string(), Value::from(length - index));
    object.insert("rindex0".to_string(), Value::from(length - index - 1));
    object.insert("first".to_string(), Value::Bool(index == 0));
    object.insert("last".to_string(), Value::Bool(index + 1 == length));
    object.insert("parentloop".to_string(), parentloop.clone());
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use crate::config::EnvironmentConfig;
    use crate::environment::Environment;
    use crate::error::{LiquidError, ResourceLimit};
    use serde_json::json;
    use std::sync::Arc;

    fn render(source: &str, data: serde_json::Value) -> Result<String, LiquidError> {
        let env = Arc::new(Environment::new());
        env.from_string(source)?.render(&data)
    }

    #[test]
    fn test_for_loop() {
        let source = "{% for x in items %}{{ x }}{% unless forloop.last %}, {% endunless %}{% endfor %}";
        assert_eq!(render(source, json!({"items": [1, 2, 3]})).unwrap(), "1, 2, 3");
    }

    #[test]
    fn test_for_else() {
        let source = "{% for x in items %}{{ x }}{% else %}nothing{% endfor %}";
        assert_eq!(render(source, json!({"items": []})).unwrap(), "nothing");
        assert_eq!(render(source, json!({})).unwrap(), "nothing");
    }

    #[test]
    fn test_forloop_helpers() {
        let source = "{% for x in (1..3) %}{{ forloop.index0 }}{{ forloop.rindex }}{{ forloop.first }} {% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "03true 12false 21false ");
    }

    #[test]
    fn test_parentloop() {
        let source = "{% for a in (1..2) %}{% for b in (1..2) %}{{ forloop.parentloop.index }}{{ b }} {% endfor %}{% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "11 12 21 22 ");
    }

    #[test]
    fn test_break_and_continue() {
        let source = "{% for x in (1..6) %}{% if x == 2 %}{% continue %}{% endif %}{% if x == 5 %}{% break %}{% endif %}{{ x }}{% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "134");
    }

    #[test]
    fn test_break_only_leaves_inner_loop() {
        let source = "{% for a in (1..2) %}{% for b in (1..3) %}{% if b == 2 %}{% break %}{% endif %}{{ a }}{{ b }}{% endfor %}{% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "1121");
    }

    #[test]
    fn test_offset_continue() {
        let source = "{% for x in items limit: 2 %}{{ x }}{% endfor %}-{% for x in items offset: continue %}{{ x }}{% endfor %}";
        assert_eq!(render(source, json!({"items": [1, 2, 3, 4]})).unwrap(), "12-34");
    }

    #[test]
    fn test_loop_variable_does_not_leak() {
        let source = "{% for x in (1..2) %}{% endfor %}{{ x }}";
        assert_eq!(render(source, json!({"x": "outer"})).unwrap(), "outer");
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let err = render("a{% break %}b", json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
    }

    #[test]
    fn test_huge_range_with_limit() {
        let source = "{% for i in (0..9223372036854775806) limit: 2 %}{{ i }}{% endfor %}";
        assert_eq!(render(source, json!({})).unwrap(), "01");

        let source = "{% for i in (1..n) reversed limit: 3 %}{{ forloop.length }}:{{ i }} {% endfor %}";
        let output = render(source, json!({"n": i64::MAX})).unwrap();
        assert_eq!(output, "3:3 3:2 3:1 ");
    }

    #[test]
    fn test_huge_range_hits_loop_limit() {
        let env = Arc::new(Environment::with_config(EnvironmentConfig {
            loop_iteration_limit: Some(1000),
            ..Default::default()
        }));
        let template = env.from_string("{% for i in (1..n) %}{{ i }}{% endfor %}").unwrap();
        let err = template.render(&json!({"n": i64::MAX})).unwrap_err();
        assert!(matches!(
            err,
            LiquidError::ResourceLimit {
                kind: ResourceLimit::LoopIterations,
                ..
            }
        ));
    }

    #[test]
    fn test_loop_iteration_limit() {
        let env = Arc::new(Environment::with_config(EnvironmentConfig {
            loop_iteration_limit: Some(50),
            ..Default::default()
        }));
        let template = env
            .from_string("{% for a in (1..10) %}{% for b in (1..10) %}.{% endfor %}{% endfor %}")
            .unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(
            err,
            LiquidError::ResourceLimit {
                kind: ResourceLimit::LoopIterations,
                ..
            }
        ));
    }
}
