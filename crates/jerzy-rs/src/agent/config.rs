//! Configuration for the [`Agent`](super::Agent).
//!
//! ```ignore
//! let config = AgentConfig::new("You are a travel planner.")
//!     .with_cache_ttl(Some(Duration::from_secs(600)))
//!     .with_context_window(20)
//!     .with_tool_log("tools.jsonl");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::memory::MemoryConfig;
use crate::tools::cache::DEFAULT_CACHE_SIZE;

/// System prompt used when none is given.
pub const DEFAULT_AGENT_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Maximum cached tool results. Default: `100`.
    pub cache_size: usize,
    /// Age after which a cached tool result is ignored. Default: one hour.
    pub cache_ttl: Option<Duration>,
    /// Thread entries included in each model request. Default: `10`.
    pub context_window: usize,
    /// Past messages injected by search-augmented replies. Default: `3`.
    pub relevant_k: usize,
    pub memory: MemoryConfig,
    /// JSONL file receiving one line per tool call. Off by default.
    pub tool_log: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_AGENT_PROMPT.to_string(),
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: Some(Duration::from_secs(3600)),
            context_window: 10,
            relevant_k: 3,
            memory: MemoryConfig::default(),
            tool_log: None,
        }
    }
}

impl AgentConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    // ── Builder methods ───────────────────────────────────────────

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn with_relevant_k(mut self, k: usize) -> Self {
        self.relevant_k = k;
        self
    }

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.memory.max_history_length = max;
        self
    }

    pub fn with_tool_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_log = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.system_prompt, DEFAULT_AGENT_PROMPT);
        assert_eq!(config.cache_size, 100);
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.context_window, 10);
        assert_eq!(config.relevant_k, 3);
        assert_eq!(config.memory.max_history_length, 100);
        assert!(config.tool_log.is_none());
    }

    #[test]
    fn builders() {
        let config = AgentConfig::new("Be terse.")
            .with_cache_size(5)
            .with_cache_ttl(None)
            .with_context_window(4)
            .with_relevant_k(1)
            .with_max_history(50)
            .with_tool_log("/tmp/tools.jsonl");
        assert_eq!(config.system_prompt, "Be terse.");
        assert_eq!(config.cache_size, 5);
        assert_eq!(config.cache_ttl, None);
        assert_eq!(config.context_window, 4);
        assert_eq!(config.relevant_k, 1);
        assert_eq!(config.memory.max_history_length, 50);
        assert_eq!(config.tool_log, Some(PathBuf::from("/tmp/tools.jsonl")));
    }
}
