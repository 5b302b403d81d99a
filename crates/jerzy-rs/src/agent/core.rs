//! The [`Agent`] façade: a lazily started conversation plus a tool result
//! cache and run state.

use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use super::chain::ConversationChain;
use super::config::AgentConfig;
use super::state::AgentState;
use crate::api::LanguageModel;
use crate::api::tool_log::ToolCallLog;
use crate::error::ChainError;
use crate::memory::{ConversationMemory, DEFAULT_THREAD, HistoryEntry};
use crate::tools::cache::ResultCache;
use crate::trace::Trace;

/// Whether the agent has started talking yet.
#[derive(Debug, Default, Clone, Copy)]
pub enum Conversation<'a> {
    #[default]
    Uninitialized,
    Active(&'a ConversationChain),
}

impl<'a> Conversation<'a> {
    pub fn is_active(&self) -> bool {
        matches!(self, Conversation::Active(_))
    }

    pub fn chain(&self) -> Option<&'a ConversationChain> {
        match *self {
            Conversation::Active(chain) => Some(chain),
            Conversation::Uninitialized => None,
        }
    }
}

/// Render a tool result for a history line: strings verbatim, everything
/// else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct Agent {
    llm: Arc<dyn LanguageModel>,
    config: AgentConfig,
    tools: Vec<String>,
    cache: ResultCache,
    state: AgentState,
    chain: Option<Box<ConversationChain>>,
    tool_log: Option<ToolCallLog>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tools)
            .field("cache", &self.cache)
            .field("conversation", &self.conversation())
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(llm: Arc<dyn LanguageModel>, config: AgentConfig) -> Self {
        let cache = ResultCache::new(config.cache_size, config.cache_ttl);
        let tool_log = config.tool_log.clone().map(ToolCallLog::new);
        Self {
            llm,
            config,
            tools: Vec::new(),
            cache,
            state: AgentState::new(),
            chain: None,
            tool_log,
        }
    }

    /// Replace the tool result cache, e.g. with one driven by a manual clock.
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub fn conversation(&self) -> Conversation<'_> {
        match &self.chain {
            Some(chain) => Conversation::Active(chain),
            None => Conversation::Uninitialized,
        }
    }

    /// Register tools by name. Names already registered are skipped.
    pub fn add_tools<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.tools.contains(&name) {
                self.tools.push(name);
            }
        }
    }

    /// The active conversation, started on first use.
    pub fn conversation_mut(&mut self) -> &mut ConversationChain {
        let llm = Arc::clone(&self.llm);
        let config = &self.config;
        self.chain.get_or_insert_with(|| {
            debug!("Starting conversation");
            Box::new(
                ConversationChain::new(llm, config.system_prompt.clone())
                    .with_memory(ConversationMemory::new(config.memory.clone()))
                    .with_relevant_k(config.relevant_k),
            )
        })
    }

    /// Store a fact and note it on the default thread.
    pub fn remember(&mut self, key: &str, value: Value) {
        let note = format!("Stored information: {key} = {}", display_value(&value));
        let chain = self.conversation_mut();
        chain.memory_mut().remember(key, value);
        chain.add_message("system", note, DEFAULT_THREAD, None);
    }

    pub fn recall(&self, key: &str) -> Option<&Value> {
        self.chain.as_deref()?.memory().recall(key)
    }

    /// Reply to `message` on `thread_id`, optionally with relevance search.
    ///
    /// `window` caps the thread entries sent with the message; `None` uses
    /// the configured `context_window`.
    pub async fn chat(
        &mut self,
        message: &str,
        thread_id: &str,
        use_search: bool,
        window: Option<usize>,
    ) -> Result<String, ChainError> {
        let window = window.unwrap_or(self.config.context_window);
        let relevant_k = self.config.relevant_k;
        let chain = self.conversation_mut();
        if use_search {
            chain
                .search_and_respond(message, thread_id, window, relevant_k)
                .await
        } else {
            chain.generate_response(message, thread_id, window).await
        }
    }

    /// Call a tool through the result cache.
    ///
    /// A fresh cached result is returned without running `f`. Otherwise `f`
    /// runs and a successful result is cached. Either way the call and its
    /// result are recorded on the current thread; failures are recorded as a
    /// call only and returned to the caller.
    pub async fn call_tool<F, Fut, E>(&mut self, tool: &str, args: Value, f: F) -> Result<Value, E>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        if let Some(hit) = self.cache.get(tool, &args).cloned() {
            self.record_tool_call(tool, &args, Some((&hit, true)));
            return Ok(hit);
        }

        let start = Instant::now();
        let outcome = f(args.clone()).await;
        if let Some(log) = &self.tool_log {
            log.log_outcome(tool, &args, &outcome, start.elapsed());
        }

        match outcome {
            Ok(result) => {
                self.record_tool_call(tool, &args, Some((&result, false)));
                self.cache.set(tool, &args, result.clone());
                Ok(result)
            }
            Err(e) => {
                warn!("Tool '{tool}' failed: {e}");
                self.record_tool_call(tool, &args, None);
                Err(e)
            }
        }
    }

    fn record_tool_call(&mut self, tool: &str, args: &Value, result: Option<(&Value, bool)>) {
        let chain = self.conversation_mut();
        let thread = chain.memory().current_thread().to_string();
        let memory = chain.memory_mut();
        memory.append_to_thread(&thread, HistoryEntry::tool_call(tool, args));
        if let Some((value, cached)) = result {
            memory.append_to_thread(
                &thread,
                HistoryEntry::tool_result(tool, display_value(value), cached),
            );
        }
    }

    /// Save the conversation. Does nothing before the conversation starts.
    pub fn save_conversation(&self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        match self.chain.as_deref() {
            Some(chain) => chain.save(path),
            None => Ok(()),
        }
    }

    pub fn load_conversation(&mut self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        self.conversation_mut().load(path)
    }

    /// Trace over the active conversation's history.
    pub fn trace(&self) -> Option<Trace<'_>> {
        self.chain
            .as_deref()
            .map(|chain| Trace::new(chain.memory().history()))
    }
}
