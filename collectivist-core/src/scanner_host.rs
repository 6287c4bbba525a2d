//! Scanner Host (C6): wraps a `Scanner` with preserve-map loading,
//! canonicalization, invariant checks, and index persistence.

use std::path::Path;

use tracing::info;

use crate::config::CollectionConfig;
use crate::error::{CollectivistError, ScannerError};
use crate::events::EventBus;
use crate::plugins::Scanner;
use crate::store;
use crate::types::CollectionItem;

/// Index path for a collection rooted at `root`.
pub fn index_path(root: &Path) -> std::path::PathBuf {
    root.join(".collection").join("index.yaml")
}

/// Run `scanner` over `root`, preserving prior descriptions/categories for
/// paths that still exist, and persist the result with the prior overview
/// intact.
pub fn run(
    root: &Path,
    scanner: &dyn Scanner,
    config: &CollectionConfig,
    bus: &EventBus,
) -> crate::error::Result<Vec<CollectionItem>> {
    let path = index_path(root);
    let (prior_items, overview) = store::load(&path)?;
    let prior_index = crate::types::CollectionIndex {
        collection_overview: overview.clone(),
        items: prior_items,
    };
    let preserve_map = prior_index.preserve_map();

    bus.set_stage("scan", 0);
    let mut items = scanner
        .scan(root, &config.scanner_config, &preserve_map)
        .map_err(|e| match e {
            CollectivistError::Scanner(inner) => CollectivistError::Scanner(inner),
            other => CollectivistError::Scanner(ScannerError::Failed {
                scanner: scanner.name().to_string(),
                message: other.to_string(),
            }),
        })?;

    for item in &mut items {
        assert_invariants(item, config);
    }

    store::save(&path, &items, overview.as_deref())?;
    info!(count = items.len(), scanner = scanner.name(), "scan complete");
    bus.complete_stage(Some(&format!("scanned {} items", items.len())));

    Ok(items)
}

/// Enforce the data-model invariants from the spec's entity section:
/// `size_bytes >= 0` (trivially true for `u64`) and a set `category` must
/// appear in `config.categories`.
fn assert_invariants(item: &mut CollectionItem, config: &CollectionConfig) {
    if let Some(category) = &item.category {
        if !config.has_category(category) {
            item.category = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::plugins::fallback::FallbackScanner;

    fn sample_config(root: &Path) -> CollectionConfig {
        CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "test".into(),
            path: root.display().to_string(),
            categories: vec!["miscellaneous".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        }
    }

    #[test]
    fn scan_persists_index_and_preserves_prior_overview() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let path = index_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        store::save(&path, &[], Some("prior overview")).unwrap();

        let config = sample_config(dir.path());
        let bus = EventBus::new();
        let items = run(dir.path(), &FallbackScanner, &config, &bus).unwrap();
        assert_eq!(items.len(), 1);

        let (_, overview) = store::load(&path).unwrap();
        assert_eq!(overview.as_deref(), Some("prior overview"));
    }

    #[test]
    fn invalid_category_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let mut item = CollectionItem {
            path: "/x".into(),
            short_name: "x".into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: 0,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: None,
            category: Some("not_a_real_category".into()),
            metadata: std::collections::HashMap::new(),
        };
        assert_invariants(&mut item, &config);
        assert!(item.category.is_none());
    }
}
