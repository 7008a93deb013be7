//! Command implementations for the `liquid2-rs` binary

pub mod check;
pub mod render;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::EnvironmentConfig;
use crate::undefined::UndefinedStrategy;

/// Load configuration, or use defaults when no file is given
///
/// `strict` overrides the configured undefined strategy.
pub fn load_config(path: Option<&Path>, strict: bool) -> Result<EnvironmentConfig> {
    let mut config = match path {
        Some(path) => EnvironmentConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => EnvironmentConfig::default(),
    };
    if strict {
        config.undefined = UndefinedStrategy::Strict;
    }
    Ok(config)
}

/// Read render data from a JSON or YAML file, chosen by extension
pub fn load_data(path: &Path) -> Result<serde_json::Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read data {:?}", path))?;
    let data = match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    tracing::debug!("Loaded render data from {:?}", path);
    Ok(data)
}
