//! Convenience re-exports for common `jerzy-rs` types.
//!
//! ```ignore
//! use jerzy_rs::prelude::*;
//! ```
//!
//! Covers building an agent, talking to a model, and inspecting memory.
//! Lower-level pieces (clocks, wire types, tool log records) stay in their
//! modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentState, Chain, Conversation, ConversationChain, PromptTemplate,
    RunOutcome,
};

// ── Models ──────────────────────────────────────────────────────────
pub use crate::api::{
    ChatClient, LanguageModel, LlmFuture, RetryPolicy, ToolCallLog, UsageTracker, with_fallback,
};

// ── Memory ──────────────────────────────────────────────────────────
pub use crate::memory::{ConversationMemory, HistoryEntry, HistoryStore, MemoryConfig};

// ── Tools and traces ────────────────────────────────────────────────
pub use crate::error::{ChainError, LlmError};
pub use crate::tools::ResultCache;
pub use crate::trace::{Trace, TraceFormat};
