//! liquid2-rs: Liquid templates with JSONPath-style variable queries
//!
//! Templates are parsed by an [`Environment`], which owns configuration,
//! filters, a template loader and global data. Variables in templates are
//! queries, so `{{ products[?@.price < 10].title }}` works alongside the
//! usual `{{ product.title }}`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use liquid2_rs::Environment;
//!
//! let env = Arc::new(Environment::new());
//! let template = env.from_string("Hello, {{ you | upcase }}!").unwrap();
//! let output = template.render(&serde_json::json!({"you": "World"})).unwrap();
//! assert_eq!(output, "Hello, WORLD!");
//! ```

pub mod ast;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod expression;
pub mod filters;
pub mod lexer;
pub mod loader;
pub mod query;
pub mod template;
pub mod undefined;
pub mod value;

pub use config::EnvironmentConfig;
pub use environment::Environment;
pub use error::LiquidError;
pub use loader::{DictLoader, FileSystemLoader, Loader};
pub use template::Template;
pub use undefined::UndefinedStrategy;
pub use value::Value;
