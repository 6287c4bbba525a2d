//! Index Store (C4): loads and atomically saves the `CollectionIndex`
//! artifact (`index.yaml`), accepting either on-disk layout and always
//! writing the newer `{collection_overview, items}` shape.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::error::{CollectivistError, PersistError};
use crate::types::CollectionItem;

/// Load an index from disk, returning `(items, overview)`. Accepts both the
/// legacy bare-list layout and the current map layout.
pub fn load(path: &Path) -> crate::error::Result<(Vec<CollectionItem>, Option<String>)> {
    if !path.exists() {
        return Ok((Vec::new(), None));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| CollectivistError::Persist(PersistError::Read(e.to_string())))?;

    let value: YamlValue = serde_yaml::from_str(&contents)
        .map_err(|e| CollectivistError::Persist(PersistError::Malformed(e.to_string())))?;

    match value {
        YamlValue::Sequence(items) => {
            let items = items
                .into_iter()
                .map(parse_item)
                .collect::<crate::error::Result<Vec<_>>>()?;
            Ok((items, None))
        }
        YamlValue::Mapping(mut map) => {
            let overview = map
                .remove(YamlValue::String("collection_overview".to_string()))
                .and_then(|v| v.as_str().map(str::to_string));
            let items = match map.remove(YamlValue::String("items".to_string())) {
                Some(YamlValue::Sequence(items)) => items
                    .into_iter()
                    .map(parse_item)
                    .collect::<crate::error::Result<Vec<_>>>()?,
                _ => Vec::new(),
            };
            Ok((items, overview))
        }
        _ => Err(CollectivistError::Persist(PersistError::Malformed(
            "index document must be a list or a mapping".to_string(),
        ))),
    }
}

/// Parse one item record, folding unrecognized keys into `metadata`.
fn parse_item(value: YamlValue) -> crate::error::Result<CollectionItem> {
    let YamlValue::Mapping(mut map) = value else {
        return Err(CollectivistError::Persist(PersistError::Malformed(
            "item record must be a mapping".to_string(),
        )));
    };

    const KNOWN_KEYS: &[&str] = &[
        "path",
        "short_name",
        "type",
        "size_bytes",
        "created",
        "modified",
        "accessed",
        "description",
        "category",
        "metadata",
    ];

    let mut metadata: HashMap<String, JsonValue> = match map.remove(YamlValue::String("metadata".to_string())) {
        Some(YamlValue::Mapping(m)) => m
            .into_iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), yaml_to_json(v))))
            .collect(),
        _ => HashMap::new(),
    };

    let extra_keys: Vec<YamlValue> = map
        .keys()
        .filter(|k| !k.as_str().is_some_and(|k| KNOWN_KEYS.contains(&k)))
        .cloned()
        .collect();
    for key in extra_keys {
        if let (Some(name), Some(v)) = (key.as_str().map(str::to_string), map.remove(&key)) {
            metadata.insert(name, yaml_to_json(v));
        }
    }

    let wrapped = YamlValue::Mapping(map);
    let mut item: CollectionItem = serde_yaml::from_value(wrapped)
        .map_err(|e| CollectivistError::Persist(PersistError::Malformed(e.to_string())))?;
    item.metadata = metadata;
    Ok(item)
}

fn yaml_to_json(value: YamlValue) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

/// Save the index atomically (write to a temp file, then rename), always in
/// the current `{collection_overview, items}` shape.
pub fn save(
    path: &Path,
    items: &[CollectionItem],
    overview: Option<&str>,
) -> crate::error::Result<()> {
    let index = crate::types::CollectionIndex {
        collection_overview: overview.map(str::to_string),
        items: items.to_vec(),
    };

    let serialized = serde_yaml::to_string(&index)
        .map_err(|e| CollectivistError::Persist(PersistError::Write(e.to_string())))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CollectivistError::Persist(PersistError::Write(e.to_string())))?;
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, serialized)
        .map_err(|e| CollectivistError::Persist(PersistError::Write(e.to_string())))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| CollectivistError::Persist(PersistError::Write(e.to_string())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionIndex, ItemKind};
    use chrono::Utc;

    fn sample_item(path: &str) -> CollectionItem {
        CollectionItem {
            path: path.to_string(),
            short_name: "thing".to_string(),
            item_type: ItemKind::dir(),
            size_bytes: 100,
            created: Utc::now(),
            modified: Utc::now(),
            accessed: Utc::now(),
            description: None,
            category: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn round_trips_through_current_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        let items = vec![sample_item("/a"), sample_item("/b")];
        save(&path, &items, Some("an overview")).unwrap();

        let (loaded, overview) = load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(overview.as_deref(), Some("an overview"));
    }

    #[test]
    fn loads_legacy_bare_list_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        let legacy = serde_yaml::to_string(&vec![sample_item("/a")]).unwrap();
        std::fs::write(&path, legacy).unwrap();

        let (loaded, overview) = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(overview.is_none());
    }

    #[test]
    fn unknown_keys_fold_into_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        let now = Utc::now().to_rfc3339();
        let doc = format!(
            "items:\n  - path: /a\n    short_name: a\n    type: dir\n    size_bytes: 10\n    created: {now}\n    modified: {now}\n    accessed: {now}\n    git_status: up_to_date\n"
        );
        std::fs::write(&path, doc).unwrap();

        let (loaded, _) = load(&path).unwrap();
        assert_eq!(loaded[0].metadata_str("git_status"), Some("up_to_date"));
    }

    #[test]
    fn missing_file_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.yaml");
        let (items, overview) = load(&path).unwrap();
        assert!(items.is_empty());
        assert!(overview.is_none());
    }

    #[test]
    fn save_flattens_metadata_to_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        let mut item = sample_item("/a");
        item.metadata.insert("git_status".to_string(), serde_json::json!("up_to_date"));
        save(&path, &[item], None).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("git_status: up_to_date"));
        assert!(!raw.contains("metadata:"));

        let (loaded, _) = load(&path).unwrap();
        assert_eq!(loaded[0].metadata_str("git_status"), Some("up_to_date"));
    }

    #[test]
    fn save_always_writes_current_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        save(&path, &[sample_item("/a")], None).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: CollectionIndex = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(parsed.items.len(), 1);
    }
}
