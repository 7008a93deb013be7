//! Template loaders
//!
//! A [`Loader`] turns a template name into source text. Parsing and caching
//! are left to the [`Environment`].

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::cache::get_mtime;
use crate::environment::Environment;
use crate::error::LiquidError;
use crate::template::Template;

/// Template source text, and where it came from
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub source: String,
    pub name: String,
    pub path: Option<PathBuf>,
    /// Modification time of `path` as a unix timestamp
    pub mtime: Option<u64>,
}

pub trait Loader: Send + Sync {
    fn get_source(&self, name: &str) -> Result<TemplateSource, LiquidError>;

    /// Find and parse template `name`
    fn load(&self, env: &Arc<Environment>, name: &str) -> Result<Arc<Template>, LiquidError> {
        let source = self.get_source(name)?;
        env.template_from_source(source).map(Arc::new)
    }
}

// ============================================================================
// DictLoader
// ============================================================================

/// Templates held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct DictLoader {
    templates: HashMap<String, String>,
}

impl DictLoader {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    /// Read every file below `dir` with one of `extensions`
    ///
    /// Templates are named by their path relative to `dir`, using `/` as
    /// the separator, so `partials/nav.liquid` is loaded by that name.
    pub fn from_dir<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> Result<Self, LiquidError> {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
        {
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !extensions.is_empty() && !extensions.contains(&ext) {
                continue;
            }

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            templates.insert(name, fs::read_to_string(path)?);
        }

        debug!("Loaded {} templates from {:?}", templates.len(), dir);
        Ok(Self { templates })
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Loader for DictLoader {
    fn get_source(&self, name: &str) -> Result<TemplateSource, LiquidError> {
        match self.templates.get(name) {
            Some(source) => Ok(TemplateSource {
                source: source.clone(),
                name: name.to_string(),
                path: None,
                mtime: None,
            }),
            None => Err(LiquidError::not_found(name, None)),
        }
    }
}

// ============================================================================
// FileSystemLoader
// ============================================================================

/// Templates read from one or more directories, searched in order
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    search_path: Vec<PathBuf>,
    /// Appended to names that don't already have an extension
    default_extension: Option<String>,
}

impl FileSystemLoader {
    pub fn new<P: Into<PathBuf>>(search_path: impl IntoIterator<Item = P>) -> Self {
        Self {
            search_path: search_path.into_iter().map(Into::into).collect(),
            default_extension: None,
        }
    }

    pub fn with_default_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.default_extension = Some(ext.trim_start_matches('.').to_string());
        self
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::from(name);
        // Names can't escape the search path
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        if relative.extension().is_none() {
            if let Some(ext) = &self.default_extension {
                relative.set_extension(ext);
            }
        }

        self.search_path
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|path| path.is_file())
    }
}

impl Loader for FileSystemLoader {
    fn get_source(&self, name: &str) -> Result<TemplateSource, LiquidError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| LiquidError::not_found(name, None))?;
        let source = fs::read_to_string(&path)?;
        let mtime = get_mtime(&path).ok();
        debug!("Read template '{}' from {:?}", name, path);
        Ok(TemplateSource {
            source,
            name: name.to_string(),
            path: Some(path),
            mtime,
        })
    }
}
