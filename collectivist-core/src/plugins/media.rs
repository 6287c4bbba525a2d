//! Scanner for image/audio/video collections. Degrades to filename-only
//! metadata without EXIF/ID3 extraction libraries (see Non-goals).

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::types::{CollectionItem, ItemKind, PreservedAnnotation};

use super::documents::visit_files;
use super::{apply_preserved, file_time, FileTimeKind, Scanner};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

#[derive(Debug)]
pub struct MediaScanner;

impl Scanner for MediaScanner {
    fn name(&self) -> &'static str {
        "media"
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["file"]
    }

    fn default_categories(&self) -> Vec<String> {
        vec![
            "photos".into(),
            "music".into(),
            "video".into(),
            "miscellaneous".into(),
        ]
    }

    fn detect(&self, root: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(root) else {
            return false;
        };
        entries.filter_map(Result::ok).any(|e| {
            e.path()
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .is_some_and(|ext| media_kind(&ext.to_lowercase()).is_some())
        })
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
            let ext = ext.to_lowercase();
            let Some(kind) = media_kind(&ext) else {
                return;
            };

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
                    ("media_kind".to_string(), json!(kind)),
                    ("file_extension".to_string(), json!(ext)),
                ]),
            };
            apply_preserved(&mut item, preserve_map);
            items.push(item);
        });

        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(items)
    }

    fn description_prompt_template(&self) -> String {
        "Generate a one-sentence description and category for this media file based on its name and type.\n\n{content}\n\nRespond as JSON: {{\"description\": \"...\", \"category\": \"...\"}}".to_string()
    }

    fn content_for_description(&self, item: &CollectionItem) -> String {
        format!(
            "Name: {}\nKind: {}",
            item.short_name,
            item.metadata_str("media_kind").unwrap_or("unknown")
        )
    }
}

fn media_kind(ext: &str) -> Option<&'static str> {
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some("image")
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some("audio")
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some("video")
    } else {
        None
    }
}
