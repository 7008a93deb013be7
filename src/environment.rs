//! The template environment
//!
//! An [`Environment`] owns everything templates share: configuration,
//! registered filters, a loader, global data and a cache of parse trees.
//! Templates hold an `Arc` back to the environment that made them, so most
//! entry points take `self: &Arc<Self>`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{Node, Parser};
use crate::cache::TemplateCache;
use crate::config::EnvironmentConfig;
use crate::context::Namespace;
use crate::error::LiquidError;
use crate::filters::{standard_filters, FilterFunction};
use crate::lexer::Lexer;
use crate::loader::{DictLoader, Loader, TemplateSource};
use crate::template::Template;
use crate::value::Value;

/// Name given to templates parsed with [`Environment::from_string`]
pub const STRING_TEMPLATE_NAME: &str = "<string>";

pub struct Environment {
    pub config: EnvironmentConfig,
    filters: HashMap<String, FilterFunction>,
    loader: Box<dyn Loader>,
    /// Variables available to every template
    pub globals: Arc<Namespace>,
    cache: TemplateCache,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with default configuration, the standard filters and
    /// no templates to load
    pub fn new() -> Self {
        Self::with_config(EnvironmentConfig::default())
    }

    pub fn with_config(config: EnvironmentConfig) -> Self {
        Self {
            config,
            filters: standard_filters(),
            loader: Box::new(DictLoader::default()),
            globals: Arc::new(Namespace::new()),
            cache: TemplateCache::new(),
        }
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self.cache.clear();
        self
    }

    pub fn with_globals(mut self, globals: Namespace) -> Self {
        self.globals = Arc::new(globals);
        self
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Add a filter, replacing any filter with the same name
    pub fn register_filter(&mut self, name: impl Into<String>, filter: FilterFunction) {
        self.filters.insert(name.into(), filter);
    }

    pub fn filter(&self, name: &str) -> Option<FilterFunction> {
        self.filters.get(name).copied()
    }

    /// Set a global variable, before the environment is shared
    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.globals).insert(name.into(), value.into());
    }

    // ========================================================================
    // Parsing and loading
    // ========================================================================

    /// Parse template source text into a syntax tree
    pub fn parse(&self, source: &str) -> Result<Vec<Node>, LiquidError> {
        let markup = Lexer::new(source).tokenize()?;
        Parser::new(self.config.trim).parse(&markup)
    }

    /// Parse a template that has no name
    pub fn from_string(self: &Arc<Self>, source: &str) -> Result<Template, LiquidError> {
        let nodes = self
            .parse(source)
            .map_err(|e| e.with_template(STRING_TEMPLATE_NAME, source))?;
        Ok(Template::new(
            Arc::clone(self),
            STRING_TEMPLATE_NAME,
            None,
            Arc::from(source),
            Arc::new(nodes),
        ))
    }

    /// Load and parse a template using the configured loader
    pub fn get_template(self: &Arc<Self>, name: &str) -> Result<Arc<Template>, LiquidError> {
        self.loader.load(self, name)
    }

    pub async fn get_template_async(
        self: &Arc<Self>,
        name: &str,
    ) -> Result<Arc<Template>, LiquidError> {
        self.get_template(name)
    }

    /// Build a template from loaded source, reusing a cached parse tree
    /// when the source has not changed
    pub fn template_from_source(
        self: &Arc<Self>,
        source: TemplateSource,
    ) -> Result<Template, LiquidError> {
        let TemplateSource {
            source,
            name,
            path,
            mtime,
        } = source;

        let (source, nodes) = match self.cache.get(&name, &source, mtime) {
            Some(entry) => (entry.source, entry.nodes),
            None => {
                debug!(template = %name, "parsing template");
                let nodes = self
                    .parse(&source)
                    .map_err(|e| e.with_template(&name, &source))?;
                let source: Arc<str> = Arc::from(source);
                let nodes = Arc::new(nodes);
                self.cache
                    .insert(&name, Arc::clone(&source), mtime, Arc::clone(&nodes));
                (source, nodes)
            }
        };

        Ok(Template::new(Arc::clone(self), name, path, source, nodes))
    }

    /// Drop every cached parse tree
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Whitespace;
    use crate::undefined::UndefinedStrategy;
    use serde_json::json;

    fn dict(templates: &[(&str, &str)]) -> DictLoader {
        DictLoader::new(
            templates
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_from_string() {
        let env = Arc::new(Environment::new());
        let template = env.from_string("Hello, {{ you }}!").unwrap();
        assert_eq!(template.name, STRING_TEMPLATE_NAME);
        assert_eq!(template.render(&json!({"you": "World"})).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_syntax_error_names_template() {
        let env = Arc::new(Environment::new().with_loader(dict(&[("bad", "\n{% nosuchtag %}")])));
        let err = env.get_template("bad").unwrap_err();
        assert!(matches!(err, LiquidError::Syntax(_)));
        let detail = err.detail().unwrap();
        assert_eq!(detail.template.as_deref(), Some("bad"));
        assert_eq!(detail.line, Some(2));
    }

    #[test]
    fn test_globals() {
        let mut env = Environment::new();
        env.set_global("site", "example.com");
        env.set_global("year", 2024);
        let env = Arc::new(env);

        let template = env.from_string("{{ site }} {{ year }}").unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "example.com 2024");
        assert_eq!(template.render(&json!({"site": "data"})).unwrap(), "data 2024");
    }

    #[test]
    fn test_template_globals_shadow_environment_globals() {
        let mut env = Environment::new();
        env.set_global("x", "env");
        let env = Arc::new(env);

        let mut globals = Namespace::new();
        globals.insert("x".to_string(), Value::from("template"));
        let template = env.from_string("{{ x }}").unwrap().with_globals(globals);
        assert_eq!(template.render(&json!({})).unwrap(), "template");
    }

    #[test]
    fn test_parse_cache() {
        let env = Arc::new(Environment::new().with_loader(dict(&[("a", "{{ 'a' }}")])));
        let first = env.get_template("a").unwrap();
        let second = env.get_template("a").unwrap();
        assert!(Arc::ptr_eq(&first.nodes, &second.nodes));

        env.clear_cache();
        let third = env.get_template("a").unwrap();
        assert!(!Arc::ptr_eq(&first.nodes, &third.nodes));
    }

    #[test]
    fn test_unknown_filter() {
        let env = Arc::new(Environment::new());
        assert!(env.filter("upcase").is_some());
        let template = env.from_string("{{ 'a' | nosuchthing }}").unwrap();
        assert!(matches!(
            template.render(&json!({})).unwrap_err(),
            LiquidError::Name(_)
        ));
    }

    #[test]
    fn test_config() {
        let env = Arc::new(Environment::with_config(EnvironmentConfig {
            trim: Whitespace::Minus,
            undefined: UndefinedStrategy::Strict,
            ..Default::default()
        }));
        let template = env.from_string("a  {{ 'b' }}  c").unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "abc");

        let template = env.from_string("{{ nosuchthing }}").unwrap();
        assert!(matches!(
            template.render(&json!({})).unwrap_err(),
            LiquidError::Undefined(_)
        ));
    }

    #[tokio::test]
    async fn test_get_template_async() {
        let env = Arc::new(Environment::new().with_loader(dict(&[("a", "{{ x }}")])));
        let template = env.get_template_async("a").await.unwrap();
        assert_eq!(template.render_async(&json!({"x": 1})).await.unwrap(), "1");
        assert!(env.get_template_async("b").await.is_err());
    }
}
