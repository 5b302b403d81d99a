//! Toolkit for conversational LLM agents with inspectable memory.
//!
//! `jerzy-rs` keeps everything an agent says, thinks and does in one
//! append-only history, and builds cheap views on top of it: named threads,
//! a keyword index for recall, and execution traces for explainability. Tool
//! results are memoized in a bounded TTL cache so repeated invocations with
//! the same arguments skip the work.
//!
//! # Getting started
//!
//! ```ignore
//! use jerzy_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ChainError> {
//!     let client = ChatClient::from_env("gpt-4o-mini")?;
//!     let mut agent = Agent::new(Arc::new(client), AgentConfig::default());
//!
//!     agent.remember("user.name", "Ada".into());
//!     let reply = agent.chat("What's my name?", "default", true, None).await?;
//!     println!("{reply}");
//!
//!     agent.save_conversation("conversation.json")?;
//!     println!("{}", agent.trace().unwrap().render(TraceFormat::Markdown)?);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Memory:** [`ConversationMemory`](memory::ConversationMemory) owns the
//!   [`HistoryStore`](memory::HistoryStore), the
//!   [`ThreadIndex`](memory::ThreadIndex) and the
//!   [`KeywordIndex`](memory::KeywordIndex). Pruning and snapshot save/load
//!   live on it too.
//!
//! - **Tool caching:** [`ResultCache`](tools::cache::ResultCache), a FIFO
//!   cache with optional TTL keyed by tool name and canonical arguments.
//!
//! - **Talking to a model:** the [`LanguageModel`](api::LanguageModel) trait
//!   and the OpenAI-compatible [`ChatClient`](api::ChatClient). Token usage is
//!   tracked by [`UsageTracker`](api::UsageTracker).
//!
//! - **Conversation flow:** [`ConversationChain`](agent::ConversationChain)
//!   assembles context windows and records replies;
//!   [`Agent`](agent::Agent) adds facts, tools and cached tool calls on top.
//!
//! - **Robustness:** [`RetryPolicy`](api::retry::RetryPolicy),
//!   [`with_fallback`](api::retry::with_fallback) and the JSONL
//!   [`ToolCallLog`](api::tool_log::ToolCallLog).
//!
//! - **Explainability:** [`Trace`](trace::Trace) renders history as text,
//!   markdown or JSON.

pub mod agent;
pub mod api;
pub mod error;
pub mod memory;
pub mod prelude;
pub mod tools;
pub mod trace;

use serde::{Deserialize, Serialize};

/// Default model used by [`ChatClient`](api::ChatClient) when none is given.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ── Message types ──────────────────────────────────────────────────

/// Role of a message sent to a model.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Parse a history role. Roles a model does not understand yield `None`.
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a model request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}
