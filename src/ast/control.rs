//! `if`, `unless` and `case`

use crate::context::{OutputBuffer, RenderContext};
use crate::error::{LiquidError, Span};
use crate::expression::Expression;

use super::{BlockNode, ConditionalBlockNode, Flow};

/// `{% if %}` or `{% unless %}`, with `elsif` and `else` branches
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub span: Span,
    pub condition: Expression,
    pub consequence: BlockNode,
    pub alternatives: Vec<ConditionalBlockNode>,
    pub default: Option<BlockNode>,
}

impl IfNode {
    /// Render the first branch whose condition holds
    ///
    /// With `negate`, the leading condition must be falsy. `elsif`
    /// conditions are never negated.
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
        negate: bool,
    ) -> Result<Flow, LiquidError> {
        if self.condition.is_satisfied(context)? != negate {
            return self.consequence.render(context, buffer);
        }

        for alternative in &self.alternatives {
            if let Some(flow) = alternative.render(context, buffer)? {
                return Ok(flow);
            }
        }

        match &self.default {
            Some(default) => default.render(context, buffer),
            None => Ok(Flow::Rendered(0)),
        }
    }
}

/// `{% case %}`
///
/// Each `when` is stored with its expression already compared against the
/// case subject, so `when a, b` becomes `subject == a or subject == b`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseNode {
    pub span: Span,
    pub whens: Vec<ConditionalBlockNode>,
    pub default: Option<BlockNode>,
}

impl CaseNode {
    /// Every matching `when` renders. `else` renders if nothing was written.
    pub fn render(
        &self,
        context: &mut RenderContext,
        buffer: &mut OutputBuffer,
    ) -> Result<Flow, LiquidError> {
        let mut written = 0;

        for when in &self.whens {
            match when.render(context, buffer)? {
                Some(Flow::Rendered(n)) => written += n,
                Some(interrupt) => return Ok(interrupt),
                None => {}
            }
        }

        if written == 0 {
            if let Some(default) = &self.default {
                return default.render(context, buffer);
            }
        }

        Ok(Flow::Rendered(written))
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use crate::error::LiquidError;
    use serde_json::json;
    use std::sync::Arc;

    fn render(source: &str, data: serde_json::Value) -> Result<String, LiquidError> {
        let env = Arc::new(Environment::new());
        env.from_string(source)?.render(&data)
    }

    #[test]
    fn test_if_elsif_else() {
        let source = "{% if x > 2 %}big{% elsif x > 0 %}small{% else %}none{% endif %}";
        assert_eq!(render(source, json!({"x": 5})).unwrap(), "big");
        assert_eq!(render(source, json!({"x": 1})).unwrap(), "small");
        assert_eq!(render(source, json!({"x": 0})).unwrap(), "none");
    }

    #[test]
    fn test_unless() {
        let source = "{% unless x %}no x{% elsif y %}y{% else %}x{% endunless %}";
        assert_eq!(render(source, json!({})).unwrap(), "no x");
        assert_eq!(render(source, json!({"x": true, "y": true})).unwrap(), "y");
        assert_eq!(render(source, json!({"x": true})).unwrap(), "x");
    }

    #[test]
    fn test_if_undefined_is_falsy() {
        assert_eq!(
            render("{% if nosuchthing %}a{% else %}b{% endif %}", json!({})).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_case() {
        let source = concat!(
            "{% case x %}\n",
            "{% when 'a', 'b' %}ab",
            "{% when 'c' or 'd' %}cd",
            "{% else %}other",
            "{% endcase %}"
        );
        assert_eq!(render(source, json!({"x": "b"})).unwrap(), "ab");
        assert_eq!(render(source, json!({"x": "d"})).unwrap(), "cd");
        assert_eq!(render(source, json!({"x": "z"})).unwrap(), "other");
    }

    #[test]
    fn test_case_renders_every_match() {
        let source = "{% case x %}{% when 1 %}one{% when 1 %}again{% endcase %}";
        assert_eq!(render(source, json!({"x": 1})).unwrap(), "oneagain");
    }

    #[test]
    fn test_case_rejects_text_before_when() {
        let err = render("{% case x %}oops{% when 1 %}{% endcase %}", json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
    }

    #[test]
    fn test_unknown_tag() {
        let err = render("{% nosuchtag %}", json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
    }

    #[test]
    fn test_missing_end_tag() {
        let err = render("{% if true %}a", json!({})).unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
    }
}
