use crate::config::CollectionConfig;
use crate::types::CollectionItem;

use super::traits::{collate, git_status_glyph, Renderer};

#[derive(Debug)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn output_path(&self) -> &'static str {
        "COLLECTION.md"
    }

    fn render(&self, items: &[CollectionItem], config: &CollectionConfig, overview: Option<&str>) -> String {
        let mut out = format!("# {}\n\n", config.name);
        out.push_str(&format!("Total Items: {}\n\n", items.len()));
        if let Some(overview) = overview {
            out.push_str(overview);
            out.push_str("\n\n");
        }

        for (category, group) in collate(items, config) {
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("## {category}\n\n"));
            for item in group {
                let glyph = item
                    .metadata_str("git_status")
                    .map(git_status_glyph)
                    .filter(|g| !g.is_empty())
                    .map(|g| format!("{g} "))
                    .unwrap_or_default();
                let description = item.description.as_deref().unwrap_or("");
                out.push_str(&format!("- {glyph}**{}** — {description}\n", item.short_name));
            }
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use std::collections::HashMap;

    #[test]
    fn renders_sections_per_category_with_glyphs() {
        let config = CollectionConfig {
            collection_type: "repositories".into(),
            status: String::new(),
            name: "My Repos".into(),
            path: "/repos".into(),
            categories: vec!["dev_tools".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        };
        let mut item = CollectionItem {
            path: "/repos/a".into(),
            short_name: "a".into(),
            item_type: crate::types::ItemKind::dir(),
            size_bytes: 10,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: Some("a repo".into()),
            category: Some("dev_tools".into()),
            metadata: HashMap::new(),
        };
        item.metadata.insert("git_status".into(), serde_json::json!("up_to_date"));

        let rendered = MarkdownRenderer.render(&[item], &config, Some("overview text"));
        assert!(rendered.contains("## dev_tools"));
        assert!(rendered.contains("[OK]"));
        assert!(rendered.contains("overview text"));
        assert!(rendered.contains("Total Items: 1"));
    }
}
