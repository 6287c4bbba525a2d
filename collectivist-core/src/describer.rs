//! Describer (C7) — the hard part. Bounded worker pool, few-shot priming,
//! incremental save-on-completion, overview synthesis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::config::CollectionConfig;
use crate::error::{CollectivistError, DescriberError};
use crate::events::EventBus;
use crate::llm::{Message, ModelClient};
use crate::plugins::Scanner;
use crate::types::{grapheme_len, truncate_graphemes, CollectionItem, MAX_DESCRIPTION_GRAPHEMES, MAX_OVERVIEW_CHARS};

/// Persists the full item list; invoked with the mutex held only for the
/// merge, never across the model call itself.
pub type SaveCallback = Arc<dyn Fn(&[CollectionItem]) -> crate::error::Result<()> + Send + Sync>;

#[derive(Deserialize)]
struct DescriptionReply {
    description: String,
    #[serde(default)]
    category: Option<String>,
}

/// Parse a model reply into `(description, category)`, falling back to the
/// raw trimmed text and the sink category on anything but clean JSON.
fn parse_reply(raw: &str, categories: &[String]) -> (String, String) {
    let sink = categories.last().cloned().unwrap_or_else(|| "miscellaneous".to_string());
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<DescriptionReply>(trimmed) {
        let description = truncate_graphemes(parsed.description.trim(), MAX_DESCRIPTION_GRAPHEMES);
        let category = parsed
            .category
            .filter(|c| categories.contains(c))
            .unwrap_or(sink);
        return (description, category);
    }

    (truncate_graphemes(trimmed, MAX_DESCRIPTION_GRAPHEMES), sink)
}

/// Render the scanner's prompt template, substituting `{content}` plus any
/// `{field}` placeholder the template names. Every placeholder left after
/// the `{content}` substitution is resolved against `item`'s well-known
/// fields or its metadata bag; any name found in neither defaults to empty
/// rather than erroring or surviving verbatim.
fn render_template(template: &str, content: &str, item: &CollectionItem) -> String {
    let with_content = template.replace("{content}", content);

    let mut rendered = String::with_capacity(with_content.len());
    let mut rest = with_content.as_str();
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after_brace = &rest[start + 1..];
        match after_brace.find('}') {
            Some(end) => {
                let field = &after_brace[..end];
                rendered.push_str(&resolve_field(field, item));
                rest = &after_brace[end + 1..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);

    rendered
}

/// Resolve one placeholder name against an item's well-known fields, then
/// its metadata bag. Unknown names default to empty.
fn resolve_field(field: &str, item: &CollectionItem) -> String {
    match field {
        "name" => item.short_name.clone(),
        "size" => item.size_bytes.to_string(),
        _ => item.metadata.get(field).map(value_to_plain_string).unwrap_or_default(),
    }
}

fn value_to_plain_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Up to 5 already-described items, in insertion order, literally rendered
/// as `- name: description [category: cat]`.
fn few_shot_block(items: &[CollectionItem], max_examples: usize) -> String {
    items
        .iter()
        .filter(|i| !i.needs_description())
        .take(max_examples)
        .map(|i| {
            format!(
                "- {}: {} [category: {}]",
                i.short_name,
                i.description.as_deref().unwrap_or(""),
                i.category.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the Describer stage over `items`, returning the updated list and a
/// freshly synthesized collection overview (if synthesis succeeds).
#[allow(clippy::too_many_arguments)]
pub async fn describe(
    items: Vec<CollectionItem>,
    scanner: Arc<dyn Scanner>,
    config: &CollectionConfig,
    client: Arc<dyn ModelClient>,
    max_workers: usize,
    few_shot_examples: usize,
    bus: Arc<EventBus>,
    save: SaveCallback,
) -> crate::error::Result<(Vec<CollectionItem>, Option<String>)> {
    let categories = config.categories.clone();
    let examples = few_shot_block(&items, few_shot_examples);

    let to_describe: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, i)| i.needs_description())
        .map(|(idx, _)| idx)
        .collect();

    bus.set_stage("describe", to_describe.len() as u64);

    let total = to_describe.len();
    if total == 0 {
        bus.info("All items already have descriptions");
        bus.complete_stage(Some("All items already have descriptions"));
        let overview = synthesize_overview(&items, &client).await;
        return Ok((items, overview));
    }

    let shared = Arc::new(Mutex::new(items));
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let completed = Arc::new(AtomicUsize::new(0));
    let described_count = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::with_capacity(to_describe.len());
    for idx in to_describe {
        let shared = Arc::clone(&shared);
        let semaphore = Arc::clone(&semaphore);
        let completed = Arc::clone(&completed);
        let described_count = Arc::clone(&described_count);
        let scanner = Arc::clone(&scanner);
        let client = Arc::clone(&client);
        let bus = Arc::clone(&bus);
        let save = Arc::clone(&save);
        let categories = categories.clone();
        let examples = examples.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");

            let item_snapshot = {
                let guard = shared.lock().await;
                guard[idx].clone()
            };
            let path = item_snapshot.path.clone();
            let short_name = item_snapshot.short_name.clone();
            let content = scanner.content_for_description(&item_snapshot);

            if content.trim().is_empty() {
                let i = completed.fetch_add(1, Ordering::SeqCst) + 1;
                bus.set_progress(i as u64, Some(&short_name));
                bus.info(format!("{short_name}: skipped (no_content)"));
                return Ok::<(), CollectivistError>(());
            }

            let template = scanner.description_prompt_template();
            let prompt = render_template(&template, &content, &item_snapshot);

            let mut user_prompt = String::new();
            if !examples.is_empty() {
                user_prompt.push_str("Examples of prior descriptions in this collection:\n");
                user_prompt.push_str(&examples);
                user_prompt.push_str("\n\n");
            }
            user_prompt.push_str(&prompt);

            let messages = [Message::user(user_prompt)];
            let outcome = client.chat(&messages, 0.3, 200).await;

            let i = completed.fetch_add(1, Ordering::SeqCst) + 1;

            match outcome {
                Ok((reply, usage)) => {
                    debug!(item = %short_name, input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "description call usage");
                    let (description, category) = parse_reply(&reply, &categories);
                    {
                        let mut guard = shared.lock().await;
                        if let Some(item) = guard.iter_mut().find(|it| it.path == path) {
                            item.set_description(description, category.clone());
                        }
                        save(&guard).map_err(|e| {
                            CollectivistError::Describer(DescriberError::PersistIo(e.to_string()))
                        })?;
                    }
                    described_count.fetch_add(1, Ordering::SeqCst);
                    bus.set_progress(i as u64, Some(&short_name));
                    bus.success(format!("{short_name}: described [{category}]"));
                }
                Err(e) => {
                    warn!(item = %short_name, error = %e, "description call failed");
                    bus.set_progress(i as u64, Some(&short_name));
                    bus.warn(format!("{short_name}: failed ({e})"));
                }
            }

            Ok(())
        }));
    }

    for task in tasks {
        task.await.expect("describer task panicked")?;
    }

    let final_items = Arc::try_unwrap(shared)
        .expect("all describer tasks have completed; no other handle remains")
        .into_inner();

    let described = described_count.load(Ordering::SeqCst);
    let overview = if described == 0 && total > 0 {
        bus.warn("every item failed to describe; skipping overview synthesis");
        None
    } else {
        synthesize_overview(&final_items, &client).await
    };

    bus.complete_stage(Some(&format!("{described}/{total}")));

    Ok((final_items, overview))
}

async fn synthesize_overview(items: &[CollectionItem], client: &Arc<dyn ModelClient>) -> Option<String> {
    let described_items: Vec<&CollectionItem> = items.iter().filter(|i| !i.needs_description()).collect();
    if described_items.is_empty() {
        return None;
    }

    let mut histogram: HashMap<&str, usize> = HashMap::new();
    for item in &described_items {
        *histogram.entry(item.category.as_deref().unwrap_or("")).or_insert(0) += 1;
    }

    let samples: Vec<String> = described_items
        .iter()
        .take(10)
        .map(|i| {
            format!(
                "{}: {} [{}]",
                i.short_name,
                i.description.as_deref().unwrap_or(""),
                i.category.as_deref().unwrap_or("")
            )
        })
        .collect();

    let prompt = format!(
        "Summarize this collection in 2-3 sentences covering its focus, dominant categories, and patterns.\n\
         Total items: {}\nDescribed: {}\nCategory counts: {:?}\nSample items:\n{}",
        items.len(),
        described_items.len(),
        histogram,
        samples.join("\n"),
    );

    match client.chat(&[Message::user(prompt)], 0.5, 300).await {
        Ok((reply, usage)) => {
            debug!(input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "overview synthesis usage");
            let text = reply.trim();
            Some(truncate_to_chars(text, MAX_OVERVIEW_CHARS))
        }
        Err(e) => {
            warn!(error = %e, "overview synthesis failed");
            None
        }
    }
}

fn truncate_to_chars(s: &str, max_chars: usize) -> String {
    if grapheme_len(s) <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_handles_clean_json() {
        let categories = vec!["dev_tools".to_string(), "misc".to_string()];
        let (desc, cat) = parse_reply(r#"{"description": "A tool", "category": "dev_tools"}"#, &categories);
        assert_eq!(desc, "A tool");
        assert_eq!(cat, "dev_tools");
    }

    #[test]
    fn parse_reply_falls_back_on_garbage() {
        let categories = vec!["dev_tools".to_string(), "misc".to_string()];
        let (desc, cat) = parse_reply("not json at all", &categories);
        assert_eq!(desc, "not json at all");
        assert_eq!(cat, "misc");
    }

    #[test]
    fn parse_reply_substitutes_sink_for_unknown_category() {
        let categories = vec!["dev_tools".to_string(), "misc".to_string()];
        let (_, cat) = parse_reply(r#"{"description": "x", "category": "nonexistent"}"#, &categories);
        assert_eq!(cat, "misc");
    }

    #[test]
    fn few_shot_block_limits_to_max_examples() {
        let mut items = Vec::new();
        for i in 0..10 {
            let mut item = crate::types::CollectionItem {
                path: format!("/{i}"),
                short_name: format!("item{i}"),
                item_type: crate::types::ItemKind::file(),
                size_bytes: 0,
                created: chrono::Utc::now(),
                modified: chrono::Utc::now(),
                accessed: chrono::Utc::now(),
                description: None,
                category: None,
                metadata: HashMap::new(),
            };
            item.set_description("desc".into(), "cat".into());
            items.push(item);
        }
        let block = few_shot_block(&items, 5);
        assert_eq!(block.lines().count(), 5);
    }

    #[tokio::test]
    async fn describe_reports_literal_message_when_nothing_needs_description() {
        use crate::events::EventBus;

        let mut item = CollectionItem {
            path: "/a".into(),
            short_name: "a".into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: 1,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: None,
            category: None,
            metadata: HashMap::new(),
        };
        item.set_description("already described".into(), "misc".into());

        let bus = Arc::new(EventBus::new());
        let mut receiver = bus.subscribe();

        #[derive(Debug)]
        struct StubClient;
        #[async_trait::async_trait]
        impl ModelClient for StubClient {
            fn name(&self) -> &str {
                "stub"
            }
            fn model_id(&self) -> &str {
                "stub-model"
            }
            async fn chat(
                &self,
                _messages: &[crate::llm::Message],
                _temperature: f64,
                _max_tokens: u32,
            ) -> crate::error::Result<(String, crate::llm::TokenUsage)> {
                Ok((String::new(), crate::llm::TokenUsage::default()))
            }
            fn cost_per_1k_input(&self) -> f64 {
                0.0
            }
            fn cost_per_1k_output(&self) -> f64 {
                0.0
            }
        }

        let config = CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "t".into(),
            path: "/t".into(),
            categories: vec!["misc".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: crate::config::ScheduleConfig::default(),
        };

        let save: SaveCallback = Arc::new(|_items| Ok(()));
        let (_items, _overview) = describe(
            vec![item],
            Arc::new(crate::plugins::fallback::FallbackScanner),
            &config,
            Arc::new(StubClient),
            5,
            5,
            Arc::clone(&bus),
            save,
        )
        .await
        .unwrap();

        let mut saw_literal_message = false;
        while let Ok(event) = receiver.try_recv() {
            if event.message == "All items already have descriptions" {
                saw_literal_message = true;
            }
        }
        assert!(saw_literal_message);
    }

    #[test]
    fn render_template_blanks_unknown_placeholders() {
        let item = crate::types::CollectionItem {
            path: "/a".into(),
            short_name: "a".into(),
            item_type: crate::types::ItemKind::file(),
            size_bytes: 42,
            created: chrono::Utc::now(),
            modified: chrono::Utc::now(),
            accessed: chrono::Utc::now(),
            description: None,
            category: None,
            metadata: HashMap::new(),
        };
        let rendered = render_template("{content} size={size} other={unknown_field}", "hi", &item);
        assert_eq!(rendered, "hi size=42 other=");
    }
}
