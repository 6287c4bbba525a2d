//! Scanner for Obsidian-style vaults: a documents variant aware of
//! `[[wiki-links]]` and `#tags`.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::types::{CollectionItem, ItemKind, PreservedAnnotation};

use super::documents::visit_files;
use super::{apply_preserved, file_time, FileTimeKind, Scanner};

#[derive(Debug)]
pub struct ObsidianScanner;

impl Scanner for ObsidianScanner {
    fn name(&self) -> &'static str {
        "obsidian"
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["file"]
    }

    fn default_categories(&self) -> Vec<String> {
        vec![
            "daily_notes".into(),
            "projects".into(),
            "reference".into(),
            "permanent_notes".into(),
            "miscellaneous".into(),
        ]
    }

    fn detect(&self, root: &Path) -> bool {
        root.join(".obsidian").is_dir()
    }

    fn scan(
        &self,
        root: &Path,
        scanner_config: &Value,
        preserve_map: &HashMap<String, PreservedAnnotation>,
    ) -> crate::error::Result<Vec<CollectionItem>> {
        let exclude_hidden = scanner_config
            .get("exclude_hidden")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut items = Vec::new();
        visit_files(root, exclude_hidden, &mut |path, metadata| {
            if path.extension().and_then(std::ffi::OsStr::to_str) != Some("md") {
                return;
            }

            let contents = std::fs::read_to_string(path).unwrap_or_default();
            let wiki_link_count = count_wiki_links(&contents);
            let tags = extract_tags(&contents);

            let canonical = path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf())
                .to_string_lossy()
                .to_string();

            let mut item = CollectionItem {
                path: canonical,
                short_name: path.file_name().unwrap_or_default().to_string_lossy().to_string(),
                item_type: ItemKind::file(),
                size_bytes: metadata.len(),
                created: file_time(metadata, FileTimeKind::Created),
                modified: file_time(metadata, FileTimeKind::Modified),
                accessed: file_time(metadata, FileTimeKind::Accessed),
                description: None,
                category: None,
                metadata: HashMap::from([
                    ("link_count".to_string(), json!(wiki_link_count)),
                    ("metadata_tags".to_string(), json!(tags)),
                ]),
            };
            apply_preserved(&mut item, preserve_map);
            items.push(item);
        });

        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(items)
    }

    fn description_prompt_template(&self) -> String {
        "Generate a one-sentence description and category for this Obsidian note.\n\nTags: {metadata_tags}\nLinks: {link_count}\n\nContent:\n---\n{content}\n---\n\nRespond as JSON: {{\"description\": \"...\", \"category\": \"...\"}}".to_string()
    }

    fn content_for_description(&self, item: &CollectionItem) -> String {
        std::fs::read_to_string(&item.path)
            .map(|text| crate::types::truncate_graphemes(&text, 3000))
            .unwrap_or_default()
    }
}

fn count_wiki_links(contents: &str) -> usize {
    contents.matches("[[").count()
}

fn extract_tags(contents: &str) -> Vec<String> {
    contents
        .split_whitespace()
        .filter(|w| w.starts_with('#') && w.len() > 1)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '#').to_string())
        .filter(|w| w.len() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_requires_obsidian_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ObsidianScanner.detect(dir.path()));
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        assert!(ObsidianScanner.detect(dir.path()));
    }

    #[test]
    fn counts_wiki_links_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(
            dir.path().join("note.md"),
            "See [[Other Note]] and [[Third]]. #project #idea",
        )
        .unwrap();

        let items = ObsidianScanner
            .scan(dir.path(), &json!({}), &HashMap::new())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].metadata_str("link_count"), None);
        assert_eq!(
            items[0].metadata.get("link_count").and_then(serde_json::Value::as_u64),
            Some(2)
        );
    }
}
