use serde::Serialize;

use crate::config::CollectionConfig;
use crate::types::CollectionItem;

use super::traits::Renderer;

#[derive(Debug)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonDocument<'a> {
    name: &'a str,
    total_items: usize,
    collection_overview: Option<&'a str>,
    categories: Vec<JsonCategory<'a>>,
}

#[derive(Serialize)]
struct JsonCategory<'a> {
    category: &'a str,
    items: Vec<&'a CollectionItem>,
}

impl Renderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn output_path(&self) -> &'static str {
        "collection.json"
    }

    fn render(&self, items: &[CollectionItem], config: &CollectionConfig, overview: Option<&str>) -> String {
        let categories = super::traits::collate(items, config)
            .into_iter()
            .filter(|(_, group)| !group.is_empty())
            .map(|(category, items)| JsonCategory { category, items })
            .collect();

        let document = JsonDocument {
            name: &config.name,
            total_items: items.len(),
            collection_overview: overview,
            categories,
        };

        serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use std::collections::HashMap;

    #[test]
    fn renders_valid_json_grouped_by_category() {
        let config = CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "t".into(),
            path: "/t".into(),
            categories: vec!["misc".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        };
        let item = CollectionItem {
            path: "/t/a".into(),
            short_name: "a".into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: 1,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: Some("desc".into()),
            category: Some("misc".into()),
            metadata: HashMap::new(),
        };
        let rendered = JsonRenderer.render(&[item], &config, None);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["categories"][0]["category"], "misc");
        assert_eq!(parsed["total_items"], 1);
    }
}
