//! Always-matches scanner of last resort: minimal metadata over any
//! directory. Registered last so more specific scanners get first refusal.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::types::{CollectionItem, ItemKind, PreservedAnnotation};

use super::{apply_preserved, file_time, FileTimeKind, Scanner};

#[derive(Debug)]
pub struct FallbackScanner;

impl Scanner for FallbackScanner {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["dir", "file"]
    }

    fn default_categories(&self) -> Vec<String> {
        vec![
            "documents".into(),
            "media_files".into(),
            "code_projects".into(),
            "data_files".into(),
            "archives".into(),
            "configuration".into(),
            "utilities".into(),
            "miscellaneous".into(),
        ]
    }

    fn detect(&self, _root: &Path) -> bool {
        true
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
        let max_depth = scanner_config
            .get("max_depth")
            .and_then(Value::as_u64)
            .unwrap_or(2) as usize;

        let mut items = Vec::new();
        visit(root, root, exclude_hidden, max_depth, 0, &mut items, preserve_map)?;
        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(items)
    }

    fn description_prompt_template(&self) -> String {
        "Generate a one-sentence description and category for this item based on its name and type.\n\n{content}\n\nRespond as JSON: {{\"description\": \"...\", \"category\": \"...\"}}".to_string()
    }

    fn content_for_description(&self, item: &CollectionItem) -> String {
        let mut lines = vec![
            format!("Name: {}", item.short_name),
            format!("Type: {}", item.item_type),
            format!("Size: {} bytes", item.size_bytes),
        ];
        if let Some(ext) = item.metadata_str("extension") {
            lines.push(format!("Extension: {ext}"));
        }
        lines.join("\n")
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    root: &Path,
    dir: &Path,
    exclude_hidden: bool,
    max_depth: usize,
    depth: usize,
    items: &mut Vec<CollectionItem>,
    preserve_map: &HashMap<String, PreservedAnnotation>,
) -> crate::error::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
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

        let is_dir = metadata.is_dir();
        let size_bytes = if is_dir { 0 } else { metadata.len() };
        let auto_category = file_type_category(&path, is_dir);
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::to_lowercase);

        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .to_string();

        let mut item = CollectionItem {
            path: canonical,
            short_name: name,
            item_type: if is_dir { ItemKind::dir() } else { ItemKind::file() },
            size_bytes,
            created: file_time(&metadata, FileTimeKind::Created),
            modified: file_time(&metadata, FileTimeKind::Modified),
            accessed: file_time(&metadata, FileTimeKind::Accessed),
            description: None,
            category: Some(auto_category.clone()),
            metadata: HashMap::from([
                ("auto_category".to_string(), json!(auto_category)),
                ("depth".to_string(), json!(depth + 1)),
            ]),
        };
        if let Some(ext) = extension {
            item.metadata.insert("extension".to_string(), json!(ext));
        }
        apply_preserved(&mut item, preserve_map);
        items.push(item);

        if is_dir && depth + 1 < max_depth {
            visit(root, &path, exclude_hidden, max_depth, depth + 1, items, preserve_map)?;
        }
    }
    Ok(())
}

fn file_type_category(path: &Path, is_dir: bool) -> String {
    if is_dir {
        return "directories".to_string();
    }
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" | "doc" | "docx" | "txt" | "md" | "rtf" => "documents",
        "mp3" | "mp4" | "avi" | "mkv" | "jpg" | "png" | "gif" => "media_files",
        "py" | "js" | "ts" | "java" | "cpp" | "c" | "go" | "rs" => "code_projects",
        "csv" | "json" | "xml" | "yaml" | "yml" | "sql" => "data_files",
        "zip" | "tar" | "gz" | "rar" | "7z" => "archives",
        "conf" | "cfg" | "ini" | "toml" => "configuration",
        "exe" | "msi" | "deb" | "rpm" | "dmg" => "utilities",
        _ => "miscellaneous",
    }
    .to_string()
}
