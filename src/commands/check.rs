//! Check templates for syntax errors without rendering them

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::LiquidError;
use crate::loader::DictLoader;

use super::load_config;

/// Default template extensions
pub const TEMPLATE_EXTENSIONS: &[&str] = &["liquid", "html"];

/// Outcome of checking a directory of templates
#[derive(Debug, Default)]
pub struct CheckReport {
    pub checked: usize,
    /// Template name and the error parsing it
    pub errors: Vec<(String, LiquidError)>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} templates checked, {} with errors",
            self.checked,
            self.errors.len()
        )
    }
}

/// Parse every template below `dir`
pub fn run(dir: &Path, extensions: &[&str], config: Option<&Path>) -> Result<CheckReport> {
    let config = load_config(config, false)?;
    let loader = DictLoader::from_dir(dir, extensions)?;
    let mut names = loader.names();
    names.sort();

    let env = Arc::new(Environment::with_config(config).with_loader(loader));
    let mut report = CheckReport::default();

    for name in names {
        report.checked += 1;
        match env.get_template(&name) {
            Ok(_) => tracing::debug!("{}: ok", name),
            Err(err) => {
                tracing::debug!("{}: {}", name, err);
                report.errors.push((name, err));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.liquid"), "{% if x %}{{ x }}{% endif %}").unwrap();
        fs::write(dir.path().join("bad.liquid"), "line one\n{% for x in %}").unwrap();
        fs::write(dir.path().join("readme.md"), "{% if %}").unwrap();

        let report = run(dir.path(), TEMPLATE_EXTENSIONS, None).unwrap();
        assert_eq!(report.checked, 2);
        assert!(!report.is_ok());
        assert_eq!(report.errors.len(), 1);

        let (name, err) = &report.errors[0];
        assert_eq!(name, "bad.liquid");
        assert_eq!(err.detail().and_then(|d| d.line), Some(2));
        assert_eq!(report.summary(), "2 templates checked, 1 with errors");
    }
}
