//! Analyzer (C5): turns an unstudied directory into a valid `CollectionConfig`.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CollectionConfig, ScheduleConfig};
use crate::error::{AnalyzerError, CollectivistError};
use crate::llm::{Message, ModelClient};
use crate::plugins::ScannerRegistry;

/// Breadth-limited summary of a directory, gathered before classification.
#[derive(Debug, Default)]
struct Inspection {
    dir_count: usize,
    file_count: usize,
    extensions: Vec<String>,
    has_git_children: bool,
    readme_excerpt: Option<String>,
}

const MAX_SAMPLED_CHILDREN: usize = 200;
const MAX_DEPTH: usize = 2;

fn inspect(root: &Path) -> crate::error::Result<Inspection> {
    let mut inspection = Inspection::default();
    let mut sampled = 0usize;

    inspect_dir(root, 0, &mut inspection, &mut sampled)
        .map_err(|e| CollectivistError::Analyzer(AnalyzerError::InspectionIo(e.to_string())))?;

    for name in ["README.md", "readme.md", "README"] {
        if let Ok(text) = std::fs::read_to_string(root.join(name)) {
            inspection.readme_excerpt = Some(crate::types::truncate_graphemes(&text, 2000));
            break;
        }
    }

    Ok(inspection)
}

fn inspect_dir(
    dir: &Path,
    depth: usize,
    inspection: &mut Inspection,
    sampled: &mut usize,
) -> std::io::Result<()> {
    if depth > MAX_DEPTH {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if *sampled >= MAX_SAMPLED_CHILDREN {
            break;
        }
        *sampled += 1;

        let path = entry.path();
        if path.is_dir() {
            inspection.dir_count += 1;
            if path.join(".git").exists() {
                inspection.has_git_children = true;
            }
            inspect_dir(&path, depth + 1, inspection, sampled)?;
        } else {
            inspection.file_count += 1;
            if let Some(ext) = path.extension().and_then(std::ffi::OsStr::to_str) {
                inspection.extensions.push(ext.to_lowercase());
            }
        }
    }
    Ok(())
}

const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp3", "mp4", "mkv", "wav"];
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst"];

/// Deterministic fallback used when the model is unavailable or names an
/// unregistered scanner.
fn heuristic_classify(inspection: &Inspection) -> &'static str {
    if inspection.has_git_children {
        return "repositories";
    }
    if inspection
        .extensions
        .iter()
        .any(|e| MEDIA_EXTENSIONS.contains(&e.as_str()))
    {
        return "media";
    }
    if inspection
        .extensions
        .iter()
        .any(|e| DOCUMENT_EXTENSIONS.contains(&e.as_str()))
    {
        return "documents";
    }
    "fallback"
}

async fn classify(
    inspection: &Inspection,
    registry: &ScannerRegistry,
    client: &dyn ModelClient,
) -> String {
    let names = registry.names().join(", ");
    let prompt = format!(
        "You are classifying a directory into exactly one collection type.\n\
         Available types: {names}\n\
         Directories: {}, Files: {}, extensions seen: {:?}, has git children: {}\n\
         README excerpt:\n{}\n\n\
         Respond with ONLY the identifier of the single best matching type, nothing else.",
        inspection.dir_count,
        inspection.file_count,
        inspection.extensions,
        inspection.has_git_children,
        inspection.readme_excerpt.as_deref().unwrap_or("(none)"),
    );

    let messages = [Message::system("You classify directories for a file-organization tool."), Message::user(prompt)];
    match client.chat(&messages, 0.0, 50).await {
        Ok((reply, usage)) => {
            debug!(input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "classification call usage");
            let candidate = reply.trim().to_lowercase();
            if registry.get(&candidate).is_some() {
                candidate
            } else {
                warn!(reply = %candidate, "model named an unregistered scanner; falling back to heuristics");
                heuristic_classify(inspection).to_string()
            }
        }
        Err(e) => {
            warn!(error = %e, "classification call failed; falling back to heuristics");
            heuristic_classify(inspection).to_string()
        }
    }
}

/// Analyze `root` and write `collection.yaml` if it doesn't already exist
/// (or `force` is set). Returns the emitted config.
pub async fn analyze(
    root: &Path,
    registry: &ScannerRegistry,
    client: Option<&dyn ModelClient>,
    force_type: Option<&str>,
    force: bool,
) -> crate::error::Result<CollectionConfig> {
    let config_path = root.join(".collection").join("collection.yaml");
    if config_path.exists() && !force {
        return Err(CollectivistError::Analyzer(AnalyzerError::AlreadyInitialized(
            config_path.display().to_string(),
        )));
    }

    let collection_type = if let Some(forced) = force_type {
        forced.to_string()
    } else {
        let inspection = inspect(root)?;
        debug!(?inspection, "inspected directory");
        match client {
            Some(client) => classify(&inspection, registry, client).await,
            None => heuristic_classify(&inspection).to_string(),
        }
    };

    let scanner = registry
        .get(&collection_type)
        .ok_or_else(|| CollectivistError::Analyzer(AnalyzerError::NoScannerForType(collection_type.clone())))?;

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "collection".to_string());

    let config = CollectionConfig {
        collection_type: collection_type.clone(),
        status: String::new(),
        name,
        path: root.display().to_string(),
        categories: scanner.default_categories(),
        exclude_hidden: true,
        scanner_config: Value::Object(serde_json::Map::new()),
        schedule: ScheduleConfig::default(),
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CollectivistError::Analyzer(AnalyzerError::EmitIo(e.to_string())))?;
    }
    let serialized = serde_yaml::to_string(&config)
        .map_err(|e| CollectivistError::Analyzer(AnalyzerError::EmitIo(e.to_string())))?;
    std::fs::write(&config_path, serialized)
        .map_err(|e| CollectivistError::Analyzer(AnalyzerError::EmitIo(e.to_string())))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::default_registry;

    #[test]
    fn heuristic_prefers_git_over_media_and_documents() {
        let inspection = Inspection {
            has_git_children: true,
            extensions: vec!["jpg".into(), "md".into()],
            ..Default::default()
        };
        assert_eq!(heuristic_classify(&inspection), "repositories");
    }

    #[test]
    fn heuristic_falls_back_to_plain_fallback() {
        let inspection = Inspection::default();
        assert_eq!(heuristic_classify(&inspection), "fallback");
    }

    #[tokio::test]
    async fn analyze_refuses_to_overwrite_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".collection")).unwrap();
        std::fs::write(dir.path().join(".collection/collection.yaml"), "collection_type: fallback\n").unwrap();

        let registry = default_registry();
        let result = analyze(dir.path(), &registry, None, None, false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn analyze_without_model_uses_heuristics() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry();
        let config = analyze(dir.path(), &registry, None, None, false).await.unwrap();
        assert_eq!(config.collection_type, "fallback");
        assert!(dir.path().join(".collection/collection.yaml").exists());
    }

    #[tokio::test]
    async fn force_type_skips_inspection_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry();
        let config = analyze(dir.path(), &registry, None, Some("documents"), false)
            .await
            .unwrap();
        assert_eq!(config.collection_type, "documents");
    }
}
