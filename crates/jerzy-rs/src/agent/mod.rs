//! Agent runtime: conversation flow, run state, prompts, and the [`Agent`]
//! façade.
//!
//! - [`chain::ConversationChain`]: context windows, model calls and
//!   search-augmented replies over a
//!   [`ConversationMemory`](crate::memory::ConversationMemory). Start here
//!   when you don't need tool caching.
//! - [`core::Agent`]: a lazily started conversation plus a tool result
//!   cache, facts, and an optional JSONL tool log.
//! - [`config::AgentConfig`]: prompt, cache, window and memory settings.
//! - [`state::AgentState`]: dotted-key state tree with a change log.
//! - [`prompt::PromptTemplate`]: `{name}` placeholder templates.

pub mod chain;
pub mod config;
pub mod core;
pub mod prompt;
pub mod state;

// Re-export commonly used items at the module level.
pub use chain::{Chain, ConversationChain, RunOutcome};
pub use config::AgentConfig;
pub use core::{Agent, Conversation};
pub use prompt::PromptTemplate;
pub use state::{AgentState, StateChange};
