use crate::config::CollectionConfig;
use crate::types::CollectionItem;

use super::traits::Renderer;

/// Generates a small interactive Nushell script over `index.yaml`. Renderers
/// that don't understand a scanner's metadata (git status, here) simply
/// omit the corresponding column rather than failing.
#[derive(Debug)]
pub struct NushellRenderer;

impl Renderer for NushellRenderer {
    fn name(&self) -> &'static str {
        "nushell"
    }

    fn output_path(&self) -> &'static str {
        "collection.nu"
    }

    fn render(&self, items: &[CollectionItem], config: &CollectionConfig, overview: Option<&str>) -> String {
        let overview_line = overview.unwrap_or("(no overview yet)");
        format!(
            r#"# {name} - Interactive Nushell Explorer

let data = (open .collection/index.yaml)

print $"Collection: {name}"
print $"Items: {count}"
print $"Total Items: {count}"
print "{overview_line}"
print ""

print "Collection items:"
$data.items | table -e | sort-by category short_name

def show-by-category [category: string] {{
    $data.items | where category == $category | table -e
}}

def search-items [query: string] {{
    $data.items | where short_name =~ $query or description =~ $query | table -e
}}

def show-stats [] {{
    $data.items | group-by category | each {{|group|
        let cat = $group.group
        let count = ($group.items | length)
        print $"  ($cat): ($count) items"
    }}
}}
"#,
            name = config.name,
            count = items.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;

    #[test]
    fn embeds_item_count_and_collection_name() {
        let config = CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "My Stuff".into(),
            path: "/t".into(),
            categories: vec!["misc".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        };
        let rendered = NushellRenderer.render(&[], &config, Some("An overview"));
        assert!(rendered.contains("My Stuff"));
        assert!(rendered.contains("Items: 0"));
        assert!(rendered.contains("An overview"));
    }
}
