//! Undefined variables
//!
//! A variable that can not be resolved becomes [`Value::Undefined`](crate::value::Value).
//! What happens when a template uses it is decided by the environment's
//! [`UndefinedStrategy`].

use serde::{Deserialize, Serialize};

use crate::error::{LiquidError, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedStrategy {
    /// Render as an empty string, falsy, iterates as an empty sequence
    #[default]
    Lax,
    /// Any use is an error
    Strict,
    /// Like `Strict`, except the `default` filter may replace it
    StrictDefault,
    /// Like `Lax`, but renders a message naming the variable
    Debug,
}

impl UndefinedStrategy {
    pub fn is_strict(self) -> bool {
        matches!(self, UndefinedStrategy::Strict | UndefinedStrategy::StrictDefault)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Undefined {
    /// The query that failed to resolve, as written
    pub path: String,
    pub span: Option<Span>,
    pub strategy: UndefinedStrategy,
}

impl Undefined {
    pub fn new(path: impl Into<String>, span: Option<Span>, strategy: UndefinedStrategy) -> Self {
        Self {
            path: path.into(),
            span,
            strategy,
        }
    }

    pub fn message(&self) -> String {
        format!("'{}' is undefined", self.path)
    }

    pub fn error(&self) -> LiquidError {
        LiquidError::undefined(self.message(), self.span)
    }

    /// Fail if this undefined may not be used at all
    pub fn check(&self) -> Result<(), LiquidError> {
        if self.strategy.is_strict() {
            Err(self.error())
        } else {
            Ok(())
        }
    }

    pub fn to_output(&self) -> Result<String, LiquidError> {
        match self.strategy {
            UndefinedStrategy::Lax => Ok(String::new()),
            UndefinedStrategy::Debug => Ok(self.message()),
            UndefinedStrategy::Strict | UndefinedStrategy::StrictDefault => Err(self.error()),
        }
    }

    /// True if the `default` filter is allowed to see this undefined
    pub fn allows_default(&self) -> bool {
        self.strategy != UndefinedStrategy::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_per_strategy() {
        let lax = Undefined::new("x.y", None, UndefinedStrategy::Lax);
        assert_eq!(lax.to_output().unwrap(), "");
        assert!(lax.check().is_ok());

        let debug = Undefined::new("x.y", None, UndefinedStrategy::Debug);
        assert_eq!(debug.to_output().unwrap(), "'x.y' is undefined");

        let strict = Undefined::new("x.y", Some(Span::new(3, 6)), UndefinedStrategy::Strict);
        let err = strict.to_output().unwrap_err();
        assert!(matches!(err, LiquidError::Undefined(_)));
        assert_eq!(err.span(), Some(Span::new(3, 6)));
        assert!(!strict.allows_default());
    }

    #[test]
    fn test_strategy_from_config_name() {
        let s: UndefinedStrategy = serde_yaml::from_str("strict_default").unwrap();
        assert_eq!(s, UndefinedStrategy::StrictDefault);
        assert!(s.is_strict());
    }
}
