use std::path::Path;

use crate::config::CollectionConfig;
use crate::error::{CollectivistError, RenderError};
use crate::types::CollectionItem;

/// Common interface for output artifact generators (C8). Rendering is a
/// pure, side-effect-free projection of `(items, config, overview)` — no
/// network access, no merge-with-existing-file semantics.
pub trait Renderer: Send + Sync {
    /// Human-readable name for this renderer.
    fn name(&self) -> &'static str;

    /// Output file path relative to the collection root.
    fn output_path(&self) -> &'static str;

    /// Generate the artifact content.
    fn render(&self, items: &[CollectionItem], config: &CollectionConfig, overview: Option<&str>) -> String;

    /// Write the rendered artifact to `<collection_root>/<output_path>`.
    fn write(
        &self,
        items: &[CollectionItem],
        config: &CollectionConfig,
        overview: Option<&str>,
        collection_root: &Path,
    ) -> crate::error::Result<()> {
        let content = self.render(items, config, overview);
        let output = collection_root.join(self.output_path());
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CollectivistError::Render(RenderError::Io(e)))?;
        }
        std::fs::write(&output, content).map_err(|e| CollectivistError::Render(RenderError::Io(e)))?;
        Ok(())
    }
}

/// Items grouped by category, each group sorted by size descending, in the
/// declared order of `config.categories` (the collation rule of §4.8).
pub fn collate<'a>(items: &'a [CollectionItem], config: &CollectionConfig) -> Vec<(&'a str, Vec<&'a CollectionItem>)> {
    config
        .categories
        .iter()
        .map(|category| {
            let mut group: Vec<&CollectionItem> = items
                .iter()
                .filter(|i| i.category.as_deref() == Some(category.as_str()))
                .collect();
            group.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
            (category.as_str(), group)
        })
        .collect()
}

/// Canonical ASCII status glyph for a scanner-reported `git_status` value.
/// Unknown statuses render empty, per §4.8.
pub fn git_status_glyph(status: &str) -> &'static str {
    match status {
        "up_to_date" => "[OK]",
        "updates_available" => "[!]",
        "error" => "[X]",
        "no_remote" => "[~]",
        "not_a_repo" => "[ ]",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use std::collections::HashMap;

    fn config() -> CollectionConfig {
        CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "t".into(),
            path: "/t".into(),
            categories: vec!["a".into(), "b".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        }
    }

    fn item(name: &str, size: u64, category: &str) -> CollectionItem {
        CollectionItem {
            path: format!("/{name}"),
            short_name: name.into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: size,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: None,
            category: Some(category.into()),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn collate_sorts_by_size_within_declared_category_order() {
        let items = vec![item("small", 10, "b"), item("big", 100, "a"), item("mid", 50, "a")];
        let config = config();
        let collated = collate(&items, &config);
        assert_eq!(collated[0].0, "a");
        assert_eq!(collated[0].1[0].short_name, "big");
        assert_eq!(collated[0].1[1].short_name, "mid");
        assert_eq!(collated[1].0, "b");
    }

    #[test]
    fn unknown_git_status_renders_empty() {
        assert_eq!(git_status_glyph("something_weird"), "");
        assert_eq!(git_status_glyph("up_to_date"), "[OK]");
    }
}
