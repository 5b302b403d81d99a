//! OpenAI-compatible chat completions client.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::usage::{ModelPricing, TokenUsage, UsageRecord, UsageTracker, pricing_for_model};
use super::{LanguageModel, LlmFuture};
use crate::Message;
use crate::error::LlmError;

/// Base URL used when `OPENAI_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Token counts reported by the API.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Parsed reply: the text plus whatever usage the server reported.
#[derive(Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<UsageInfo>,
}

/// Turn a response body into a [`Completion`].
///
/// An `error` object, a missing choice or a null content are all errors.
pub fn parse_response(body: &str) -> Result<Completion, LlmError> {
    let parsed: RawChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(LlmError::Api(err.message));
    }

    let content = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .ok_or(LlmError::EmptyResponse)?;

    Ok(Completion {
        content,
        usage: parsed.usage,
    })
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    pricing: ModelPricing,
    usage: Mutex<UsageTracker>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jerzy-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::Request(format!("failed to build HTTP client: {e}")))?;
        let model = model.into();
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pricing: pricing_for_model(&model),
            model,
            usage: Mutex::new(UsageTracker::new()),
        })
    }

    /// Build a client from `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::MissingApiKey("OPENAI_API_KEY".into()))?;
        let client = Self::new(api_key, model)?;
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    /// Point the client at another server. A trailing `/` is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send one chat completion request and record its usage.
    pub async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };
        debug!(
            "LLM request: model={}, messages={}",
            self.model,
            messages.len()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("failed to read response: {e}")))?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let completion = parse_response(&text)?;
        if let Some(usage) = &completion.usage {
            self.record_usage(usage);
        }
        Ok(completion.content)
    }

    fn record_usage(&self, usage: &UsageInfo) {
        let prompt = usage.prompt_tokens.unwrap_or(0);
        let completion = usage.completion_tokens.unwrap_or(0);
        debug!(
            "Token usage: prompt={prompt}, completion={completion}, total={}",
            usage.total_tokens.unwrap_or(prompt.saturating_add(completion))
        );
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(prompt, completion, usage.total_tokens, &self.pricing);
    }

    /// Per-call usage records, oldest first.
    pub fn usage_history(&self) -> Vec<UsageRecord> {
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .history()
            .to_vec()
    }

    pub fn reset_usage(&self) {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).reset();
    }
}

impl LanguageModel for ChatClient {
    fn generate<'a>(&'a self, messages: &'a [Message]) -> LlmFuture<'a> {
        Box::pin(self.complete(messages))
    }

    fn usage(&self) -> Option<TokenUsage> {
        Some(
            self.usage
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .totals()
                .clone(),
        )
    }
}
