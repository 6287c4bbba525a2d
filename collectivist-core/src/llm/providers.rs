// Model client implementations: Anthropic, and a generic OpenAI-compatible
// endpoint (also covers local/self-hosted OpenAI-compatible servers via
// `base_url`).
#![allow(clippy::cast_precision_loss)]

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelClientConfig;
use crate::error::{CollectivistError, ProviderError};

use super::{Message, ModelClient, TokenUsage};

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("reqwest client builds with a fixed timeout")
}

// ── Anthropic ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            http: http_client(timeout_secs),
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait::async_trait]
impl ModelClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        max_tokens: u32,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/messages", self.base_url);

        // Anthropic splits out system messages rather than inlining them.
        let system = messages
            .iter()
            .find(|m| m.role == super::Role::System)
            .map(|m| m.content.clone());
        let turns = messages
            .iter()
            .filter(|m| m.role != super::Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        let mut body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            temperature,
            messages: turns,
        };
        if system.is_some() {
            // AnthropicRequest has no system field; fold it into the first
            // user turn rather than growing the request shape for one field.
            if let Some(first) = body.messages.first_mut() {
                first.content = format!("{}\n\n{}", system.unwrap(), first.content);
            }
        }

        debug!(model = %self.model, "Calling Anthropic API");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CollectivistError::Provider(ProviderError::Transport(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CollectivistError::Provider(ProviderError::HttpStatus {
                status,
                body: text,
            }));
        }

        let result: AnthropicResponse = resp.json().await.map_err(|e| {
            CollectivistError::Provider(ProviderError::MalformedResponse(e.to_string()))
        })?;

        let text = result
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("opus") {
            0.015
        } else if self.model.contains("sonnet") {
            0.003
        } else if self.model.contains("haiku") {
            0.00025
        } else {
            0.003
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("opus") {
            0.075
        } else if self.model.contains("sonnet") {
            0.015
        } else if self.model.contains("haiku") {
            0.00125
        } else {
            0.015
        }
    }
}

// ── OpenAI-compatible (also covers local/custom endpoints) ──────────

#[derive(Debug)]
pub struct OpenAiCompatibleClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http: http_client(timeout_secs),
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait::async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        max_tokens: u32,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens,
            temperature,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        debug!(model = %self.model, "Calling OpenAI-compatible API");

        let mut req = self.http.post(&url).header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| CollectivistError::Provider(ProviderError::Transport(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CollectivistError::Provider(ProviderError::HttpStatus {
                status,
                body: text,
            }));
        }

        let result: OpenAiResponse = resp.json().await.map_err(|e| {
            CollectivistError::Provider(ProviderError::MalformedResponse(e.to_string()))
        })?;

        let text = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        let usage = result.usage.unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.0025
        } else if self.model.contains("gpt-4") {
            0.03
        } else {
            0.0015
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.01
        } else if self.model.contains("gpt-4") {
            0.06
        } else {
            0.002
        }
    }
}

/// Build a [`ModelClient`] from a resolved configuration.
pub fn create_client(config: &ModelClientConfig) -> crate::error::Result<Box<dyn ModelClient>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicClient::new(
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
            config.base_url.clone(),
            config.timeout_secs,
        ))),
        "openai" | "custom" => Ok(Box::new(OpenAiCompatibleClient::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.timeout_secs,
        ))),
        other => Err(CollectivistError::Config(crate::error::ConfigError::Invalid(
            format!("Unknown provider: {other}. Use: anthropic, openai, custom"),
        ))),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
