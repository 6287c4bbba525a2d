//! Plugin Registry & Scanner Contract (C3).

pub mod documents;
pub mod fallback;
pub mod media;
pub mod obsidian;
pub mod repositories;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::types::{CollectionItem, PreservedAnnotation};

/// A capability bundle a collection type implements to scan its own tree.
///
/// Scanning is synchronous: it runs on a blocking thread (via
/// `tokio::task::spawn_blocking` in the Scanner Host) rather than through an
/// async trait, since the work is filesystem and subprocess I/O, not network
/// concurrency.
pub trait Scanner: Send + Sync + std::fmt::Debug {
    /// Stable identifier, matched against `CollectionConfig::collection_type`.
    fn name(&self) -> &'static str;

    /// Informational list of item kinds this scanner produces.
    fn supported_types(&self) -> Vec<&'static str>;

    /// Categories a freshly-analyzed collection of this type should start with.
    fn default_categories(&self) -> Vec<String>;

    /// Cheap, non-recursive (beyond small sampling) heuristic: does `root`
    /// look like a collection of this type?
    fn detect(&self, root: &Path) -> bool;

    /// Walk `root` and produce the full item list, honoring `preserve_map`
    /// for descriptions/categories of items that still exist.
    fn scan(
        &self,
        root: &Path,
        scanner_config: &Value,
        preserve_map: &HashMap<String, PreservedAnnotation>,
    ) -> crate::error::Result<Vec<CollectionItem>>;

    /// Prompt template with a `{content}` placeholder plus any scanner-named
    /// optional fields (see the Describer's documented field set).
    fn description_prompt_template(&self) -> String;

    /// Content fed into the `{content}` placeholder for one item. At most
    /// 3000 graphemes; may be empty (the item is then skipped as `no_content`).
    fn content_for_description(&self, item: &CollectionItem) -> String;
}

/// Ordered collection of registered scanners, queried by name or by
/// `auto_detect`.
///
/// Scanners are held behind `Arc` rather than `Box`: the Pipeline
/// Orchestrator needs to move a looked-up scanner into a `spawn_blocking`
/// task while the registry itself stays borrowed elsewhere, and scanners
/// are stateless, so sharing is free.
#[derive(Debug, Default)]
pub struct ScannerRegistry {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scanner. Idempotent: re-registering a name already present
    /// replaces the earlier entry in place rather than duplicating it.
    pub fn register(&mut self, scanner: Arc<dyn Scanner>) {
        if let Some(existing) = self.scanners.iter().position(|s| s.name() == scanner.name()) {
            self.scanners[existing] = scanner;
        } else {
            self.scanners.push(scanner);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.iter().find(|s| s.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|s| s.name()).collect()
    }

    /// First scanner whose `detect()` returns true, in registration order.
    /// The fallback scanner is always registered last, so it only wins when
    /// nothing more specific matches.
    pub fn auto_detect(&self, root: &Path) -> Option<Arc<dyn Scanner>> {
        self.scanners.iter().find(|s| s.detect(root)).cloned()
    }
}

/// Build the registry with every scanner the engine ships, in priority
/// order, `fallback` always last.
pub fn default_registry() -> ScannerRegistry {
    let mut registry = ScannerRegistry::new();
    registry.register(Arc::new(repositories::RepositoryScanner));
    registry.register(Arc::new(obsidian::ObsidianScanner));
    registry.register(Arc::new(documents::DocumentScanner));
    registry.register(Arc::new(media::MediaScanner));
    registry.register(Arc::new(fallback::FallbackScanner));
    registry
}

/// Shared helper: apply a preserved `(description, category)` pair onto a
/// freshly-scanned item, keyed by canonical path.
pub fn apply_preserved(
    item: &mut CollectionItem,
    preserve_map: &HashMap<String, PreservedAnnotation>,
) {
    if let Some(prior) = preserve_map.get(&item.path) {
        item.description = prior.description.clone();
        item.category = prior.category.clone();
    }
}

/// Which of a file's three timestamps to read.
#[derive(Clone, Copy)]
pub(crate) enum FileTimeKind {
    Created,
    Modified,
    Accessed,
}

/// Read one of a file's timestamps, falling back to now on platforms that
/// don't support it (e.g. `created()` on some filesystems).
pub(crate) fn file_time(
    metadata: &std::fs::Metadata,
    kind: FileTimeKind,
) -> chrono::DateTime<chrono::Utc> {
    let system_time = match kind {
        FileTimeKind::Created => metadata.created(),
        FileTimeKind::Modified => metadata.modified(),
        FileTimeKind::Accessed => metadata.accessed(),
    };
    system_time
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_always_last_and_always_detects() {
        let registry = default_registry();
        let names = registry.names();
        assert_eq!(names.last(), Some(&"fallback"));

        let dir = tempfile::tempdir().unwrap();
        assert!(registry.auto_detect(dir.path()).is_some());
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let mut registry = ScannerRegistry::new();
        registry.register(Arc::new(fallback::FallbackScanner));
        registry.register(Arc::new(fallback::FallbackScanner));
        assert_eq!(registry.names().len(), 1);
    }
}
