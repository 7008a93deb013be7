//! Render a template file

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::environment::Environment;
use crate::loader::{FileSystemLoader, TemplateSource};

use super::{load_config, load_data};

/// Options for `liquid2-rs render`
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub template: PathBuf,
    /// JSON or YAML file with render data
    pub data: Option<PathBuf>,
    /// Where `include`, `render` and `extends` look for templates
    pub templates: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub strict: bool,
    /// Write here instead of returning output to print
    pub output: Option<PathBuf>,
}

/// Render `options.template`, returning the output
pub async fn run(options: &RenderOptions) -> Result<String> {
    let config = load_config(options.config.as_deref(), options.strict)?;

    let template_dir = options
        .template
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut search_path = Vec::new();
    if let Some(dir) = &options.templates {
        search_path.push(dir.clone());
    }
    search_path.push(template_dir);

    let env = Arc::new(
        Environment::with_config(config).with_loader(FileSystemLoader::new(search_path)),
    );

    let source = fs::read_to_string(&options.template)
        .with_context(|| format!("Failed to read template {:?}", options.template))?;
    let name = options
        .template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let template = env.template_from_source(TemplateSource {
        source,
        name,
        path: Some(options.template.clone()),
        mtime: None,
    })?;

    let data = match &options.data {
        Some(path) => load_data(path)?,
        None => serde_json::Value::Object(Default::default()),
    };

    tracing::debug!("Rendering {:?}", options.template);
    let output = template.render_async(&data).await?;

    if let Some(path) = &options.output {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &output)?;
        tracing::info!("Wrote {} bytes to {:?}", output.len(), path);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_render_with_data_and_partials() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(
            dir.path().join("page.liquid"),
            "{% render 'nav.liquid', title: title %}|{{ items | join: ',' }}",
        )
        .unwrap();
        fs::write(dir.path().join("partials/nav.liquid"), "<{{ title }}>").unwrap();
        fs::write(dir.path().join("data.yml"), "title: Home\nitems: [1, 2]\n").unwrap();

        let options = RenderOptions {
            template: dir.path().join("page.liquid"),
            data: Some(dir.path().join("data.yml")),
            templates: Some(dir.path().join("partials")),
            ..Default::default()
        };
        assert_eq!(run(&options).await.unwrap(), "<Home>|1,2");
    }

    #[tokio::test]
    async fn test_render_to_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.liquid"), "{{ 'x' | upcase }}").unwrap();
        let out = dir.path().join("out/a.txt");

        let options = RenderOptions {
            template: dir.path().join("a.liquid"),
            output: Some(out.clone()),
            ..Default::default()
        };
        run(&options).await.unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "X");
    }

    #[tokio::test]
    async fn test_render_strict() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.liquid"), "{{ missing }}").unwrap();

        let mut options = RenderOptions {
            template: dir.path().join("a.liquid"),
            ..Default::default()
        };
        assert_eq!(run(&options).await.unwrap(), "");
        options.strict = true;
        assert!(run(&options).await.is_err());
    }
}
