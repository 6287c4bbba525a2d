//! Scanner for markdown/text document corpora.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::types::{CollectionItem, ItemKind, PreservedAnnotation};

use super::{apply_preserved, file_time, FileTimeKind, Scanner};

const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc"];

#[derive(Debug)]
pub struct DocumentScanner;

impl Scanner for DocumentScanner {
    fn name(&self) -> &'static str {
        "documents"
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["file"]
    }

    fn default_categories(&self) -> Vec<String> {
        vec![
            "reference".into(),
            "guides".into(),
            "notes".into(),
            "archive".into(),
            "miscellaneous".into(),
        ]
    }

    fn detect(&self, root: &Path) -> bool {
        count_matching_extensions(root, DOCUMENT_EXTENSIONS) > 0
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
            let Some(ext) = path.extension().and_then(std::ffi::OsStr::to_str) else {
                return;
            };
            if !DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                return;
            }

            let contents = std::fs::read_to_string(path).unwrap_or_default();
            let word_count = contents.split_whitespace().count();
            let has_frontmatter = contents.trim_start().starts_with("---");
            let link_count = contents.matches("](").count();
            let short_name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
            let title = extract_title(&contents).unwrap_or_else(|| {
                path.file_stem().unwrap_or_default().to_string_lossy().to_string()
            });

            let canonical = path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf())
                .to_string_lossy()
                .to_string();

            let mut item = CollectionItem {
                path: canonical,
                short_name,
                item_type: ItemKind::file(),
                size_bytes: metadata.len(),
                created: file_time(metadata, FileTimeKind::Created),
                modified: file_time(metadata, FileTimeKind::Modified),
                accessed: file_time(metadata, FileTimeKind::Accessed),
                description: None,
                category: None,
                metadata: HashMap::from([
                    ("word_count".to_string(), json!(word_count)),
                    ("has_frontmatter".to_string(), json!(has_frontmatter)),
                    ("link_count".to_string(), json!(link_count)),
                    ("file_extension".to_string(), json!(ext)),
                    ("page_count".to_string(), json!(0)),
                    ("author".to_string(), json!("")),
                    ("title".to_string(), json!(title)),
                ]),
            };
            apply_preserved(&mut item, preserve_map);
            items.push(item);
        });

        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(items)
    }

    fn description_prompt_template(&self) -> String {
        "Generate a one-sentence description and category for this document.\n\nTitle: {title}\nWord count: {word_count}\nHas frontmatter: {has_frontmatter}\n\nContent:\n---\n{content}\n---\n\nRespond as JSON: {{\"description\": \"...\", \"category\": \"...\"}}".to_string()
    }

    fn content_for_description(&self, item: &CollectionItem) -> String {
        std::fs::read_to_string(&item.path)
            .map(|text| crate::types::truncate_graphemes(&text, 3000))
            .unwrap_or_default()
    }
}

/// First markdown heading, else the first non-empty line among the first
/// 10, truncated to 100 characters. `None` if the document has no content
/// to draw a title from.
fn extract_title(contents: &str) -> Option<String> {
    if let Some(first_line) = contents.split('\n').next() {
        if first_line.trim_start().starts_with('#') {
            let heading = first_line.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return Some(crate::types::truncate_graphemes(heading, 100));
            }
        }
    }

    contents
        .lines()
        .take(10)
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| crate::types::truncate_graphemes(line, 100))
}

fn count_matching_extensions(root: &Path, extensions: &[&str]) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| {
            e.path()
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .is_some_and(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        })
        .count()
}

/// Visit files up to depth 2 under `root`, skipping hidden entries when
/// `exclude_hidden` is set.
pub(super) fn visit_files(
    root: &Path,
    exclude_hidden: bool,
    f: &mut dyn FnMut(&Path, &std::fs::Metadata),
) {
    visit_files_depth(root, exclude_hidden, 0, 2, f);
}

fn visit_files_depth(
    dir: &Path,
    exclude_hidden: bool,
    depth: usize,
    max_depth: usize,
    f: &mut dyn FnMut(&Path, &std::fs::Metadata),
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if exclude_hidden && name.starts_with('.') {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            if depth < max_depth {
                visit_files_depth(&path, exclude_hidden, depth + 1, max_depth, f);
            }
        } else {
            f(&path, &metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_true_with_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# hi").unwrap();
        assert!(DocumentScanner.detect(dir.path()));
    }

    #[test]
    fn scan_reports_word_count_and_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "---\ntitle: x\n---\nhello world").unwrap();
        let items = DocumentScanner
            .scan(dir.path(), &json!({}), &HashMap::new())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].metadata_str("file_extension"), Some("md"));
    }

    #[test]
    fn scan_populates_title_author_and_page_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# My Document\n\nsome body text").unwrap();
        let items = DocumentScanner
            .scan(dir.path(), &json!({}), &HashMap::new())
            .unwrap();
        assert_eq!(items[0].metadata_str("title"), Some("My Document"));
        assert_eq!(items[0].metadata_str("author"), Some(""));
        assert_eq!(
            items[0].metadata.get("page_count").and_then(serde_json::Value::as_u64),
            Some(0)
        );
    }

    #[test]
    fn extract_title_falls_back_to_filename_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("untitled.txt"), "").unwrap();
        let items = DocumentScanner
            .scan(dir.path(), &json!({}), &HashMap::new())
            .unwrap();
        assert_eq!(items[0].metadata_str("title"), Some("untitled"));
    }
}
