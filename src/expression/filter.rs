//! Filter calls inside an expression

use std::fmt;

use crate::context::RenderContext;
use crate::error::{ErrorDetail, LiquidError, Span};
use crate::filters::{FilterArgs, FilterError};
use crate::value::Value;

use super::Expression;

/// A positional or keyword argument to a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArgument {
    Positional(Expression),
    Keyword { name: String, value: Expression },
}

impl FilterArgument {
    pub fn value(&self) -> &Expression {
        match self {
            FilterArgument::Positional(value) | FilterArgument::Keyword { value, .. } => value,
        }
    }
}

/// `name: arg, key: value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<FilterArgument>,
    pub span: Span,
}

impl Filter {
    pub fn new(name: impl Into<String>, args: Vec<FilterArgument>, span: Span) -> Self {
        Self {
            name: name.into(),
            args,
            span,
        }
    }

    /// Apply this filter to `left`
    pub fn apply(&self, left: Value, context: &mut RenderContext) -> Result<Value, LiquidError> {
        let function = context.filter(&self.name, self.span)?;
        let args = self.evaluate_args(context)?;

        // Only `default` ever sees an undefined value.
        let left = match left {
            Value::Undefined(u) if self.name == "default" && u.allows_default() => {
                Value::Undefined(u)
            }
            Value::Undefined(u) => {
                u.check()?;
                Value::Nil
            }
            other => other,
        };

        function.call(&left, &args, context).map_err(|err| match err {
            FilterError::Argument(message) => LiquidError::FilterArgument(ErrorDetail::new(
                format!("{}: {}", self.name, message),
                Some(self.span),
            )),
            FilterError::Liquid(err) => err.or_span(self.span),
        })
    }

    fn evaluate_args(&self, context: &mut RenderContext) -> Result<FilterArgs, LiquidError> {
        let mut args = FilterArgs::default();
        for arg in &self.args {
            match arg {
                FilterArgument::Positional(value) => {
                    args.positional.push(value.evaluate(context)?);
                }
                FilterArgument::Keyword { name, value } => {
                    args.keyword.push((name.clone(), value.evaluate(context)?));
                }
            }
        }
        Ok(args)
    }

    pub fn children(&self) -> Vec<&Expression> {
        self.args.iter().map(FilterArgument::value).collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { ", " })?;
            match arg {
                FilterArgument::Positional(value) => write!(f, "{}", value)?,
                FilterArgument::Keyword { name, value } => write!(f, "{}: {}", name, value)?,
            }
        }
        Ok(())
    }
}
