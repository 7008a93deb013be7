//! Environment configuration (`liquid.yml` or `liquid.toml`)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::lexer::Whitespace;
use crate::undefined::UndefinedStrategy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Rendering options shared by every template in an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// HTML escape output unless it is already markup
    pub auto_escape: bool,

    /// Whitespace control applied where a tag has no marker
    pub trim: Whitespace,

    /// What to do with variables that can't be resolved
    pub undefined: UndefinedStrategy,

    // Limits
    pub context_depth_limit: usize,
    pub max_recursion_depth: usize,
    pub loop_iteration_limit: Option<usize>,
    pub local_namespace_limit: Option<usize>,
    pub output_stream_limit: Option<usize>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            auto_escape: false,
            trim: Whitespace::Default,
            undefined: UndefinedStrategy::Lax,

            context_depth_limit: 30,
            max_recursion_depth: 100,
            loop_iteration_limit: None,
            local_namespace_limit: None,
            output_stream_limit: None,
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from a YAML or TOML file, chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        tracing::debug!("Loaded environment config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.context_depth_limit, 30);
        assert_eq!(config.max_recursion_depth, 100);
        assert_eq!(config.undefined, UndefinedStrategy::Lax);
        assert!(config.loop_iteration_limit.is_none());
        assert!(!config.auto_escape);
    }

    #[test]
    fn test_load_yaml() {
        let file = write_config(
            ".yml",
            "auto_escape: true\ntrim: minus\nundefined: strict_default\nloop_iteration_limit: 1000\n",
        );
        let config = EnvironmentConfig::load(file.path()).unwrap();
        assert!(config.auto_escape);
        assert_eq!(config.trim, Whitespace::Minus);
        assert_eq!(config.undefined, UndefinedStrategy::StrictDefault);
        assert_eq!(config.loop_iteration_limit, Some(1000));
        assert_eq!(config.context_depth_limit, 30);
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            "undefined = \"strict\"\noutput_stream_limit = 4096\ntrim = \"smart\"\n",
        );
        let config = EnvironmentConfig::load(file.path()).unwrap();
        assert_eq!(config.undefined, UndefinedStrategy::Strict);
        assert_eq!(config.output_stream_limit, Some(4096));
        assert_eq!(config.trim, Whitespace::Smart);
    }

    #[test]
    fn test_load_errors() {
        let file = write_config(".yml", "undefined: sometimes\n");
        assert!(matches!(
            EnvironmentConfig::load(file.path()),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            EnvironmentConfig::load("/no/such/liquid.yml"),
            Err(ConfigError::Io(_))
        ));
    }
}
