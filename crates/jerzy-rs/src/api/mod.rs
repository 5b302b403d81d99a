//! Model interaction layer: the [`LanguageModel`] seam, an HTTP client, usage
//! accounting, retry, and tool-call logging.
//!
//! - [`client`]: [`ChatClient`], an OpenAI-compatible chat completions
//!   adapter over `reqwest`.
//! - [`usage`]: per-model pricing tables and the cumulative
//!   [`UsageTracker`].
//! - [`retry`]: [`RetryPolicy`] with fixed or exponential backoff, and
//!   [`with_fallback`](retry::with_fallback).
//! - [`tool_log`]: append-only JSONL audit log of tool invocations.

pub mod client;
pub mod retry;
pub mod tool_log;
pub mod usage;

use std::future::Future;
use std::pin::Pin;

use crate::Message;
use crate::error::LlmError;

pub use client::ChatClient;
pub use retry::{Backoff, RetryPolicy, with_fallback};
pub use tool_log::ToolCallLog;
pub use usage::{ModelPricing, TokenUsage, UsageRecord, UsageTracker, pricing_for_model};

/// Boxed future returned by [`LanguageModel::generate`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// A chat model that turns a message list into a reply.
///
/// Implementations must be shareable across tasks. Returning a boxed future
/// keeps the trait object-safe, so callers hold `Arc<dyn LanguageModel>`.
///
/// ```ignore
/// struct Canned;
///
/// impl LanguageModel for Canned {
///     fn generate<'a>(&'a self, _messages: &'a [Message]) -> LlmFuture<'a> {
///         Box::pin(async { Ok("canned reply".to_string()) })
///     }
/// }
/// ```
pub trait LanguageModel: Send + Sync {
    fn generate<'a>(&'a self, messages: &'a [Message]) -> LlmFuture<'a>;

    /// Cumulative token usage, for models that report it.
    fn usage(&self) -> Option<TokenUsage> {
        None
    }
}
