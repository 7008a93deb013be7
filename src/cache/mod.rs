//! Parsed template cache
//!
//! Loading a template by name goes through the loader every time, so a
//! template edited on disk is picked up on the next load. What is cached is
//! the parse tree. An entry is reused only while the source's content hash
//! and modification time both match what was seen when it was parsed.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing::trace;

use crate::ast::Node;

/// A parse tree and what it was parsed from
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Content hash of the template source
    pub content_hash: u64,
    /// Last modification time (as unix timestamp), for file system templates
    pub mtime: Option<u64>,
    pub source: Arc<str>,
    pub nodes: Arc<Vec<Node>>,
}

/// Parse trees keyed by template name
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached entry for `name`, if it was parsed from the same source
    pub fn get(&self, name: &str, source: &str, mtime: Option<u64>) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(name)?;
        if entry.mtime != mtime || entry.content_hash != hash_content(source) {
            return None;
        }
        trace!(template = name, "template cache hit");
        Some(entry.clone())
    }

    pub fn insert(&self, name: &str, source: Arc<str>, mtime: Option<u64>, nodes: Arc<Vec<Node>>) {
        let entry = CacheEntry {
            content_hash: hash_content(&source),
            mtime,
            source,
            nodes,
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(name.to_string(), entry);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Calculate a hash for template source
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Get file modification time as unix timestamp
pub fn get_mtime(path: &Path) -> std::io::Result<u64> {
    let metadata = fs::metadata(path)?;
    let mtime = metadata.modified()?;
    Ok(mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Span;

    fn nodes(text: &str) -> Arc<Vec<Node>> {
        Arc::new(vec![Node::Content {
            span: Span::new(0, text.len()),
            text: text.to_string(),
        }])
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = TemplateCache::new();
        assert!(cache.get("a", "hello", None).is_none());

        cache.insert("a", Arc::from("hello"), None, nodes("hello"));
        assert_eq!(cache.len(), 1);
        let entry = cache.get("a", "hello", None).unwrap();
        assert_eq!(&*entry.source, "hello");

        assert!(cache.get("a", "changed", None).is_none());
        assert!(cache.get("a", "hello", Some(1)).is_none());
        assert!(cache.get("b", "hello", None).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = TemplateCache::new();
        cache.insert("a", Arc::from("x"), Some(10), nodes("x"));
        assert!(cache.get("a", "x", Some(10)).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hash_content() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }
}
