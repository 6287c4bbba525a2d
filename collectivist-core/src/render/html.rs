use crate::config::CollectionConfig;
use crate::types::CollectionItem;

use super::traits::{collate, git_status_glyph, Renderer};

#[derive(Debug)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn output_path(&self) -> &'static str {
        "collection.html"
    }

    fn render(&self, items: &[CollectionItem], config: &CollectionConfig, overview: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{}</title></head><body>\n", escape(&config.name)));
        out.push_str(&format!("<h1>{}</h1>\n", escape(&config.name)));
        out.push_str(&format!("<div>Total Items: {}</div>\n", items.len()));
        if let Some(overview) = overview {
            out.push_str(&format!("<p>{}</p>\n", escape(overview)));
        }

        for (category, group) in collate(items, config) {
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("<h2>{}</h2>\n<ul>\n", escape(category)));
            for item in group {
                let glyph = item
                    .metadata_str("git_status")
                    .map(git_status_glyph)
                    .filter(|g| !g.is_empty())
                    .map(|g| format!("{g} "))
                    .unwrap_or_default();
                let description = item.description.as_deref().unwrap_or("");
                out.push_str(&format!(
                    "<li>{glyph}<strong>{}</strong> — {}</li>\n",
                    escape(&item.short_name),
                    escape(description)
                ));
            }
            out.push_str("</ul>\n");
        }

        out.push_str("</body></html>\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use std::collections::HashMap;

    #[test]
    fn escapes_html_special_characters() {
        let config = CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "<Test>".into(),
            path: "/t".into(),
            categories: vec!["misc".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        };
        let item = CollectionItem {
            path: "/t/a".into(),
            short_name: "a & b".into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: 1,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: Some("<script>".into()),
            category: Some("misc".into()),
            metadata: HashMap::new(),
        };
        let rendered = HtmlRenderer.render(&[item], &config, None);
        assert!(rendered.contains("&lt;Test&gt;"));
        assert!(rendered.contains("&amp;"));
        assert!(!rendered.contains("<script>"));
        assert!(rendered.contains("Total Items: 1"));
    }
}
