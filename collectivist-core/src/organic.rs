//! Organic Placer (C9): discovers freshly-arrived items and proposes (or
//! applies) a tidy home for them, learning folder conventions from the
//! current tree and index rather than from a fixed layout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CollectionConfig;
use crate::error::{CollectivistError, PlacementError};
use crate::events::EventBus;
use crate::llm::{Message, ModelClient};
use crate::types::CollectionItem;

/// Default look-back window for discovering new arrivals.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// One candidate found during discovery: an item not yet present in the
/// index, created within the look-back window.
#[derive(Debug, Clone)]
pub struct NewArrival {
    pub path: PathBuf,
    pub short_name: String,
    pub content_excerpt: String,
}

/// Naming convention observed in a top-level folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStyle {
    Kebab,
    Snake,
    Lower,
    Upper,
    Mixed,
}

impl NamingStyle {
    fn detect(names: &[String]) -> Self {
        if names.is_empty() {
            return Self::Mixed;
        }
        let all = |f: &dyn Fn(&str) -> bool| names.iter().all(|n| f(n));
        if all(&|n| n.contains('-') && !n.contains('_')) {
            Self::Kebab
        } else if all(&|n| n.contains('_') && !n.contains('-')) {
            Self::Snake
        } else if all(&|n| n.chars().all(|c| !c.is_alphabetic() || c.is_lowercase())) {
            Self::Lower
        } else if all(&|n| n.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())) {
            Self::Upper
        } else {
            Self::Mixed
        }
    }
}

#[derive(Debug, Clone)]
struct FolderStats {
    item_count: usize,
    naming_style: NamingStyle,
}

/// What the current tree and index reveal about where things live.
#[derive(Debug, Clone, Default)]
pub struct StructuralMemory {
    /// `category -> histogram<top-level folder name, count>`.
    category_folders: HashMap<String, HashMap<String, usize>>,
    folder_hierarchy: HashMap<String, FolderStats>,
}

impl StructuralMemory {
    /// Build the memory from the current index and the root's top-level
    /// folders.
    pub fn build(root: &Path, items: &[CollectionItem]) -> Self {
        let mut category_folders: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for item in items {
            let Some(category) = &item.category else { continue };
            let Some(folder) = top_level_folder(root, Path::new(&item.path)) else { continue };
            *category_folders
                .entry(category.clone())
                .or_default()
                .entry(folder)
                .or_insert(0) += 1;
        }

        let mut folder_hierarchy = HashMap::new();
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let child_names: Vec<String> = std::fs::read_dir(entry.path())
                    .map(|it| {
                        it.flatten()
                            .map(|e| e.file_name().to_string_lossy().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                folder_hierarchy.insert(
                    name,
                    FolderStats {
                        item_count: child_names.len(),
                        naming_style: NamingStyle::detect(&child_names),
                    },
                );
            }
        }

        Self {
            category_folders,
            folder_hierarchy,
        }
    }

    /// Most common folder a category's items live in, if there is at least
    /// one observation.
    pub fn mode_folder(&self, category: &str) -> Option<&str> {
        self.category_folders
            .get(category)?
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(folder, _)| folder.as_str())
    }

    /// Compact table rendering handed to the model as context.
    pub fn render_table(&self) -> String {
        let mut lines = vec!["category | top folders (by count)".to_string()];
        for (category, folders) in &self.category_folders {
            let mut entries: Vec<(&String, &usize)> = folders.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1));
            let rendered = entries
                .iter()
                .map(|(folder, count)| format!("{folder}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("{category} | {rendered}"));
        }
        lines.push("folder | item_count | naming_style".to_string());
        for (folder, stats) in &self.folder_hierarchy {
            lines.push(format!("{folder} | {} | {:?}", stats.item_count, stats.naming_style));
        }
        lines.join("\n")
    }
}

fn top_level_folder(root: &Path, item_path: &Path) -> Option<String> {
    let relative = item_path.strip_prefix(root).ok()?;
    relative
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
}

/// A proposed (or applied) destination for a [`NewArrival`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementProposal {
    pub category: String,
    pub suggested_folder: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Enumerate filesystem entries under `root` whose creation time falls
/// within `lookback` of now, skipping the engine's own state directory and
/// hidden paths.
pub fn discover(root: &Path, lookback: Duration) -> std::io::Result<Vec<NewArrival>> {
    let now = SystemTime::now();
    let mut arrivals = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == ".collection" {
            continue;
        }
        let metadata = entry.metadata()?;
        let created = metadata.created().unwrap_or(now);
        let age = now.duration_since(created).unwrap_or_default();
        if age > lookback {
            continue;
        }
        let path = entry.path();
        let content_excerpt = excerpt(&path);
        arrivals.push(NewArrival {
            path,
            short_name: name,
            content_excerpt,
        });
    }
    Ok(arrivals)
}

/// Up to 2 KB of content: a text file's head, or a directory summary (name
/// plus up to 10 child names and any README head).
fn excerpt(path: &Path) -> String {
    const MAX_BYTES: usize = 2048;
    if path.is_dir() {
        let mut children: Vec<String> = std::fs::read_dir(path)
            .map(|it| {
                it.flatten()
                    .take(10)
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        children.sort();
        let readme = ["README.md", "readme.md", "README"]
            .iter()
            .find_map(|name| std::fs::read_to_string(path.join(name)).ok());
        let mut summary = format!(
            "directory: {}\nchildren: {}",
            path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
            children.join(", ")
        );
        if let Some(readme) = readme {
            summary.push_str("\nreadme: ");
            summary.push_str(&crate::types::truncate_graphemes(&readme, 500));
        }
        crate::types::truncate_graphemes(&summary, MAX_BYTES)
    } else {
        std::fs::read_to_string(path)
            .map(|s| crate::types::truncate_graphemes(&s, MAX_BYTES))
            .unwrap_or_default()
    }
}

/// Keyword rules used when the model is unavailable; confidence is capped
/// low since this is a blunt, name-only signal.
fn heuristic_placement(arrival: &NewArrival, config: &CollectionConfig) -> PlacementProposal {
    const AI_KEYWORDS: &[&str] = &["ai", "llm", "gpt", "agent"];
    let lowered = arrival.short_name.to_lowercase();

    let category = if AI_KEYWORDS.iter().any(|kw| lowered.contains(kw)) && config.has_category("ai_llm_agents") {
        "ai_llm_agents".to_string()
    } else {
        config.sink_category().to_string()
    };

    PlacementProposal {
        category: category.clone(),
        suggested_folder: category,
        confidence: 0.4,
        reasoning: "keyword heuristic fallback".to_string(),
    }
}

/// Ask the model for a placement, falling back to keyword heuristics on
/// any failure. Prefers the observed mode folder for the chosen category
/// over the model's free-form folder suggestion when one is on record.
pub async fn propose_placement(
    arrival: &NewArrival,
    config: &CollectionConfig,
    memory: &StructuralMemory,
    client: Option<&dyn ModelClient>,
) -> PlacementProposal {
    let Some(client) = client else {
        return heuristic_placement(arrival, config);
    };

    let prompt = format!(
        "A new item arrived in a collection and needs a home.\n\
         Name: {}\n\
         Content:\n{}\n\n\
         Available categories: {}\n\
         Current folder layout:\n{}\n\n\
         Respond with JSON {{\"category\": str, \"suggested_folder\": str, \"confidence\": float 0-1, \"reasoning\": str}}.",
        arrival.short_name,
        arrival.content_excerpt,
        config.categories.join(", "),
        memory.render_table(),
    );
    let messages = [
        Message::system("You place new files into an existing organizational scheme."),
        Message::user(prompt),
    ];

    match client.chat(&messages, 0.0, 200).await {
        Ok((reply, usage)) => {
            debug!(input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "placement call usage");
            match serde_json::from_str::<PlacementProposal>(reply.trim()) {
                Ok(mut proposal) => {
                    if !config.has_category(&proposal.category) {
                        proposal.category = config.sink_category().to_string();
                    }
                    if let Some(mode) = memory.mode_folder(&proposal.category) {
                        proposal.suggested_folder = mode.to_string();
                    }
                    proposal
                }
                Err(e) => {
                    warn!(error = %e, reply = %reply, "placement reply was not valid JSON; falling back to heuristics");
                    heuristic_placement(arrival, config)
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "placement call failed; falling back to heuristics");
            heuristic_placement(arrival, config)
        }
    }
}

/// Move `arrival` into `<root>/<folder>/`, creating the folder if needed.
/// Best-effort and non-transactional: the target must not already exist,
/// and any I/O error abandons (does not partially apply) the move.
pub fn apply_move(root: &Path, arrival: &NewArrival, folder: &str) -> crate::error::Result<PathBuf> {
    let target_dir = root.join(folder);
    let target = target_dir.join(&arrival.short_name);

    if target.exists() {
        return Err(CollectivistError::Placement(PlacementError::TargetExists(
            target.display().to_string(),
        )));
    }

    std::fs::create_dir_all(&target_dir)
        .map_err(|e| CollectivistError::Placement(PlacementError::MoveFailed(e.to_string())))?;
    std::fs::rename(&arrival.path, &target)
        .map_err(|e| CollectivistError::Placement(PlacementError::MoveFailed(e.to_string())))?;

    Ok(target)
}

/// Run discovery and placement for every new arrival under `root`, applying
/// moves when `config.schedule.auto_file` is set and confidence clears the
/// configured threshold; otherwise emitting the proposal as a suggestion.
pub async fn place_new_arrivals(
    root: &Path,
    items: &[CollectionItem],
    config: &CollectionConfig,
    client: Option<&dyn ModelClient>,
    bus: &EventBus,
) -> crate::error::Result<Vec<PlacementProposal>> {
    let arrivals = discover(root, DEFAULT_LOOKBACK)
        .map_err(|e| CollectivistError::Placement(PlacementError::MoveFailed(e.to_string())))?;
    bus.set_stage("organic", arrivals.len() as u64);

    let memory = StructuralMemory::build(root, items);
    let mut proposals = Vec::with_capacity(arrivals.len());

    for (i, arrival) in arrivals.iter().enumerate() {
        bus.set_progress(i as u64 + 1, Some(&arrival.short_name));
        let proposal = propose_placement(arrival, config, &memory, client).await;

        if config.schedule.auto_file && proposal.confidence >= config.schedule.confidence_threshold {
            match apply_move(root, arrival, &proposal.suggested_folder) {
                Ok(target) => bus.success(format!(
                    "moved {} -> {} (confidence {:.2})",
                    arrival.short_name,
                    target.display(),
                    proposal.confidence
                )),
                Err(e) => bus.warn(format!("could not place {}: {e}", arrival.short_name)),
            }
        } else {
            bus.info(format!(
                "suggest {} -> {}/{} (confidence {:.2})",
                arrival.short_name, proposal.suggested_folder, arrival.short_name, proposal.confidence
            ));
        }

        proposals.push(proposal);
    }

    bus.complete_stage(Some(&format!("{} new arrivals considered", arrivals.len())));
    Ok(proposals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;

    fn config(categories: &[&str]) -> CollectionConfig {
        CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "t".into(),
            path: "/t".into(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        }
    }

    #[test]
    fn naming_style_detects_kebab_and_snake() {
        let kebab = vec!["foo-bar".to_string(), "baz-qux".to_string()];
        assert_eq!(NamingStyle::detect(&kebab), NamingStyle::Kebab);
        let snake = vec!["foo_bar".to_string(), "baz_qux".to_string()];
        assert_eq!(NamingStyle::detect(&snake), NamingStyle::Snake);
    }

    #[test]
    fn heuristic_placement_matches_ai_keywords_when_category_exists() {
        let config = config(&["ai_llm_agents", "miscellaneous"]);
        let arrival = NewArrival {
            path: "/t/my-llm-agent".into(),
            short_name: "my-llm-agent".into(),
            content_excerpt: String::new(),
        };
        let proposal = heuristic_placement(&arrival, &config);
        assert_eq!(proposal.category, "ai_llm_agents");
        assert!(proposal.confidence <= 0.4);
    }

    #[test]
    fn heuristic_placement_falls_back_to_sink_without_matching_category() {
        let config = config(&["miscellaneous"]);
        let arrival = NewArrival {
            path: "/t/my-llm-agent".into(),
            short_name: "my-llm-agent".into(),
            content_excerpt: String::new(),
        };
        let proposal = heuristic_placement(&arrival, &config);
        assert_eq!(proposal.category, "miscellaneous");
    }

    #[test]
    fn discover_skips_hidden_paths_and_state_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".collection")).unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        std::fs::write(dir.path().join("visible.txt"), "x").unwrap();

        let arrivals = discover(dir.path(), DEFAULT_LOOKBACK).unwrap();
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].short_name, "visible.txt");
    }

    #[test]
    fn apply_move_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/a.txt"), "already here").unwrap();

        let arrival = NewArrival {
            path: dir.path().join("a.txt"),
            short_name: "a.txt".into(),
            content_excerpt: String::new(),
        };
        let result = apply_move(dir.path(), &arrival, "docs");
        assert!(result.is_err());
    }
}
