use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The per-collection schema document, authored by the Analyzer and then
/// edited by humans. Matches `.collection/collection.yaml` on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Identifier matching a registered scanner name. Immutable after first write.
    pub collection_type: String,
    /// Decorative unicode glyph, round-tripped but never interpreted.
    #[serde(default)]
    pub status: String,
    pub name: String,
    /// Absolute path to the collection root.
    pub path: String,
    /// Ordered list of category identifiers; the last is the "misc" sink.
    pub categories: Vec<String>,
    #[serde(default = "default_true")]
    pub exclude_hidden: bool,
    /// Opaque, scanner-specific configuration bag.
    #[serde(default)]
    pub scanner_config: Value,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_true() -> bool {
    true
}

impl CollectionConfig {
    /// The category new items fall back to when the model doesn't name a
    /// known one. By invariant this is always `categories.last()`.
    pub fn sink_category(&self) -> &str {
        self.categories
            .last()
            .map(String::as_str)
            .unwrap_or("miscellaneous")
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c == name)
    }

    /// Validate the non-empty / unique-identifiers invariants from the data model.
    pub fn validate(&self) -> Result<(), String> {
        if self.categories.is_empty() {
            return Err("categories must be non-empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for cat in &self.categories {
            if !seen.insert(cat) {
                return Err(format!("duplicate category identifier: {cat}"));
            }
        }
        Ok(())
    }
}

/// How scheduled/organic runs are gated for this collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: ScheduleEnabled,
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    #[serde(default)]
    pub auto_file: bool,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: ScheduleEnabled::default(),
            interval_days: default_interval_days(),
            operations: default_operations(),
            auto_file: false,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_interval_days() -> u32 {
    7
}

fn default_operations() -> Vec<String> {
    vec!["scan".into(), "describe".into(), "render".into()]
}

fn default_confidence_threshold() -> f64 {
    0.6
}

/// `enabled` is either a plain boolean or the literal string `"organic"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleEnabled {
    #[default]
    Disabled,
    Enabled(bool),
    Organic,
}

impl ScheduleEnabled {
    pub fn is_organic(&self) -> bool {
        matches!(self, Self::Organic)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(true) | Self::Organic)
    }
}

/// Configuration for reaching a chat-style language model, resolved via
/// the precedence chain documented in [`crate::llm::discovery`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelClientConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Concurrency and behavior knobs for the Describer stage that aren't part
/// of the persisted collection config (CLI-overridable, per run).
#[derive(Debug, Clone, Copy)]
pub struct DescribeOptions {
    pub max_workers: usize,
    pub few_shot_examples: usize,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            max_workers: 5,
            few_shot_examples: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_category_is_last() {
        let config = sample_config();
        assert_eq!(config.sink_category(), "miscellaneous");
    }

    #[test]
    fn validate_rejects_empty_categories() {
        let mut config = sample_config();
        config.categories.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_categories() {
        let mut config = sample_config();
        config.categories.push("dev_tools".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn schedule_enabled_untagged_variants_round_trip() {
        let organic: ScheduleEnabled = serde_yaml::from_str("organic").unwrap();
        assert!(organic.is_organic());
        assert!(organic.is_enabled());

        let enabled: ScheduleEnabled = serde_yaml::from_str("true").unwrap();
        assert!(enabled.is_enabled());
        assert!(!enabled.is_organic());

        let disabled: ScheduleEnabled = serde_yaml::from_str("false").unwrap();
        assert!(!disabled.is_enabled());
    }

    fn sample_config() -> CollectionConfig {
        CollectionConfig {
            collection_type: "repositories".into(),
            status: String::new(),
            name: "my-repos".into(),
            path: "/home/user/repos".into(),
            categories: vec!["dev_tools".into(), "miscellaneous".into()],
            exclude_hidden: true,
            scanner_config: Value::Null,
            schedule: ScheduleConfig::default(),
        }
    }
}
