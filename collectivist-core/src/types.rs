use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Hard cap on a `CollectionItem` description, in graphemes.
pub const MAX_DESCRIPTION_GRAPHEMES: usize = 150;

/// Hard cap on the collection overview, in characters.
pub const MAX_OVERVIEW_CHARS: usize = 500;

/// Truncate `s` to at most `max_graphemes` grapheme clusters.
pub fn truncate_graphemes(s: &str, max_graphemes: usize) -> String {
    s.graphemes(true).take(max_graphemes).collect()
}

/// Count of grapheme clusters in `s`.
pub fn grapheme_len(s: &str) -> usize {
    s.graphemes(true).count()
}

/// Kind of filesystem entity a `CollectionItem` represents.
///
/// Scanners may introduce domain-specific kinds (e.g. `"note"`, `"dataset"`)
/// beyond the two universal ones, so this is a newtype over `String` rather
/// than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKind(pub String);

impl ItemKind {
    pub const DIR: &'static str = "dir";
    pub const FILE: &'static str = "file";

    pub fn dir() -> Self {
        Self(Self::DIR.to_string())
    }

    pub fn file() -> Self {
        Self(Self::FILE.to_string())
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a git repository, as reported by the `repositories` scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitStatus {
    UpToDate,
    UpdatesAvailable,
    Error,
    NoRemote,
    NotARepo,
}

impl GitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpToDate => "up_to_date",
            Self::UpdatesAvailable => "updates_available",
            Self::Error => "error",
            Self::NoRemote => "no_remote",
            Self::NotARepo => "not_a_repo",
        }
    }

    /// Canonical ASCII status glyph (see Renderer Adapter open question).
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::UpToDate => "[OK]",
            Self::UpdatesAvailable => "[!]",
            Self::Error => "[X]",
            Self::NoRemote => "[~]",
            Self::NotARepo => "[ ]",
        }
    }
}

impl std::fmt::Display for GitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One indexed unit (file or directory) within a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Absolute, canonical path. Primary key within a collection.
    pub path: String,
    pub short_name: String,
    #[serde(rename = "type")]
    pub item_type: ItemKind,
    pub size_bytes: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Scanner-specific fields. Flattened to the item's top level on save,
    /// and folded back in from any unrecognized top-level key on load (see
    /// `store::parse_item`) so a round trip through disk is lossless.
    #[serde(flatten)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CollectionItem {
    /// Whether this item still needs a description/category pass.
    pub fn needs_description(&self) -> bool {
        self.description.as_deref().unwrap_or("").trim().is_empty()
            || self.category.as_deref().unwrap_or("").trim().is_empty()
    }

    pub fn set_description(&mut self, description: String, category: String) {
        self.description = Some(truncate_graphemes(description.trim(), MAX_DESCRIPTION_GRAPHEMES));
        self.category = Some(category);
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// The persisted artifact: items plus an optional collection-level overview.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_overview: Option<String>,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
}

impl CollectionIndex {
    /// `path -> {description, category}` for items that already have both.
    pub fn preserve_map(&self) -> HashMap<String, PreservedAnnotation> {
        self.items
            .iter()
            .filter(|item| !item.needs_description())
            .map(|item| {
                (
                    item.path.clone(),
                    PreservedAnnotation {
                        description: item.description.clone(),
                        category: item.category.clone(),
                    },
                )
            })
            .collect()
    }
}

/// A prior `description`/`category` pair carried forward across a rescan.
#[derive(Debug, Clone, Default)]
pub struct PreservedAnnotation {
    pub description: Option<String>,
    pub category: Option<String>,
}

/// A single invocation of the pipeline orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages_run: Vec<String>,
    pub last_error: Option<String>,
}

impl PipelineRun {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            stages_run: Vec::new(),
            last_error: None,
        }
    }
}
