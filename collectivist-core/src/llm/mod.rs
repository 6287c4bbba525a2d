pub mod discovery;
pub mod providers;

use serde::{Deserialize, Serialize};

/// One turn in a chat-style conversation sent to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a `chat` request.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Token usage from a single `chat` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Tracks cumulative model usage across a pipeline run, for operator
/// visibility (the engine itself enforces no cost budget — see §4.1).
#[allow(clippy::cast_precision_loss)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostTracker {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_requests: u64,
    pub estimated_cost_usd: f64,
}

#[allow(clippy::cast_precision_loss)]
impl CostTracker {
    pub fn record_call(
        &mut self,
        usage: &TokenUsage,
        cost_per_1k_input: f64,
        cost_per_1k_output: f64,
    ) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.total_requests += 1;
        self.estimated_cost_usd += (usage.input_tokens as f64 / 1000.0) * cost_per_1k_input
            + (usage.output_tokens as f64 / 1000.0) * cost_per_1k_output;
    }
}

/// Provider-neutral contract for a chat-style model (C1). Every concrete
/// provider is reached as an OpenAI-style chat-completions endpoint — the
/// neutrality is a contract on the trait, not a shared implementation.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// The model ID being used.
    fn model_id(&self) -> &str;

    /// Send a chat completion request and return the reply text plus usage.
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        max_tokens: u32,
    ) -> crate::error::Result<(String, TokenUsage)>;

    /// Cost per 1K input tokens (USD), for the [`CostTracker`].
    fn cost_per_1k_input(&self) -> f64;

    /// Cost per 1K output tokens (USD), for the [`CostTracker`].
    fn cost_per_1k_output(&self) -> f64;

    /// Fast-fail connectivity check: a minimal request that succeeds iff a
    /// non-empty reply comes back. Never retries; callers treat failure as
    /// a hard stop before the Describer stage (§4.10).
    async fn probe(&self) -> crate::error::Result<bool> {
        let messages = [Message::user("ping")];
        match self.chat(&messages, 0.0, 10).await {
            Ok((text, _)) => Ok(!text.trim().is_empty()),
            Err(e) => Err(e),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
