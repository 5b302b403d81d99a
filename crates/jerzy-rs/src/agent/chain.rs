//! Conversation flow over a [`ConversationMemory`], and a small step pipeline.
//!
//! [`ConversationChain`] builds a model request from the system prompt and a
//! window of recent thread entries, sends it, and records both sides of the
//! exchange. [`ConversationChain::search_and_respond`] additionally injects
//! the most relevant past messages as a system message.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::LanguageModel;
use crate::error::ChainError;
use crate::memory::{ConversationMemory, HistoryEntry, HistoryStore};
use crate::{Message, MessageRole};

/// System prompt used when none is given.
pub const DEFAULT_CHAIN_PROMPT: &str = "You are a helpful assistant.";

const CONTEXT_HEADER: &str = "Here are some relevant messages from our past conversation:\n\n";
const CONTEXT_FOOTER: &str = "Please consider this context when responding.";

/// Result of [`ConversationChain::run`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub response: String,
    pub thread_id: String,
    /// Local completion time, ISO-8601.
    pub timestamp: String,
    /// Seconds spent producing the response.
    pub processing_time: f64,
    pub context_window: usize,
    pub used_search: bool,
}

pub struct ConversationChain {
    llm: Arc<dyn LanguageModel>,
    memory: ConversationMemory,
    system_prompt: String,
    relevant_k: usize,
}

impl std::fmt::Debug for ConversationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationChain")
            .field("system_prompt", &self.system_prompt)
            .field("entries", &self.memory.history().len())
            .field("threads", &self.memory.threads().len())
            .finish_non_exhaustive()
    }
}

impl ConversationChain {
    pub fn new(llm: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            memory: ConversationMemory::default(),
            system_prompt: system_prompt.into(),
            relevant_k: 3,
        }
    }

    /// Start from existing memory instead of an empty one.
    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Number of relevant messages [`run`](Self::run) injects when searching.
    pub fn with_relevant_k(mut self, k: usize) -> Self {
        self.relevant_k = k;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ConversationMemory {
        &mut self.memory
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Record a message on `thread_id`. Returns its global index.
    pub fn add_message(
        &mut self,
        role: &str,
        content: impl Into<String>,
        thread_id: &str,
        metadata: Option<Map<String, Value>>,
    ) -> usize {
        let mut entry = HistoryEntry::new(role, content);
        if let Some(metadata) = metadata {
            entry.metadata = metadata;
        }
        self.memory.append_to_thread(thread_id, entry)
    }

    /// Model request for a thread: the system prompt (optional) followed by
    /// the last `window` entries whose role a model understands.
    pub fn context(
        &self,
        thread_id: &str,
        window: usize,
        include_system_prompt: bool,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(window + 1);
        if include_system_prompt {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.extend(
            self.memory
                .thread(thread_id, Some(window))
                .into_iter()
                .filter_map(|entry| {
                    MessageRole::parse(&entry.role).map(|role| Message::new(role, &entry.content))
                }),
        );
        messages
    }

    /// Answer `query` using the recent thread context.
    ///
    /// The query is recorded as a user message unless the context already
    /// ends with that exact user message. On a model error the query stays
    /// recorded and no assistant message is added.
    pub async fn generate_response(
        &mut self,
        query: &str,
        thread_id: &str,
        window: usize,
    ) -> Result<String, ChainError> {
        let mut messages = self.context(thread_id, window, true);
        let already_asked = messages
            .last()
            .is_some_and(|m| m.role == MessageRole::User && m.content == query);
        if !already_asked {
            messages.push(Message::user(query));
            self.add_message("user", query, thread_id, None);
        }

        self.complete(&messages, thread_id).await
    }

    /// Answer `query` with up to `relevant_k` relevant past messages injected
    /// right after the system prompt.
    pub async fn search_and_respond(
        &mut self,
        query: &str,
        thread_id: &str,
        window: usize,
        relevant_k: usize,
    ) -> Result<String, ChainError> {
        let mut messages = self.context(thread_id, window, true);

        let relevant = self.memory.find_relevant(query, relevant_k);
        if !relevant.is_empty() {
            debug!("Injecting {} relevant message(s) into context", relevant.len());
            let position = match messages.first() {
                Some(first) if first.role == MessageRole::System => 1,
                _ => 0,
            };
            messages.insert(position, Message::system(relevant_context(&relevant)));
        }

        messages.push(Message::user(query));
        self.add_message("user", query, thread_id, None);

        self.complete(&messages, thread_id).await
    }

    async fn complete(&mut self, messages: &[Message], thread_id: &str) -> Result<String, ChainError> {
        let response = self.llm.generate(messages).await?;
        self.add_message("assistant", response.as_str(), thread_id, None);
        Ok(response)
    }

    /// Respond to `input`, with or without relevance search, and report
    /// timing metadata.
    pub async fn run(
        &mut self,
        input: &str,
        thread_id: &str,
        window: usize,
        use_search: bool,
    ) -> Result<RunOutcome, ChainError> {
        let start = Instant::now();
        let response = if use_search {
            let k = self.relevant_k;
            self.search_and_respond(input, thread_id, window, k).await?
        } else {
            self.generate_response(input, thread_id, window).await?
        };

        Ok(RunOutcome {
            response,
            thread_id: thread_id.to_string(),
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            processing_time: start.elapsed().as_secs_f64(),
            context_window: window,
            used_search: use_search,
        })
    }

    pub async fn summarize(&self, thread_id: &str) -> String {
        self.memory
            .summarize_thread(thread_id, Some(self.llm.as_ref()))
            .await
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        Ok(self.memory.save(path)?)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        Ok(self.memory.load(path)?)
    }
}

fn relevant_context(entries: &[&HistoryEntry]) -> String {
    let mut context = String::from(CONTEXT_HEADER);
    for entry in entries {
        context.push_str(&format!("{}: {}\n\n", entry.role, entry.content));
    }
    context.push_str(CONTEXT_FOOTER);
    context
}

// ── Step pipeline ──────────────────────────────────────────────────

/// A pipeline step: takes the previous step's output and the shared history.
pub type Step = Box<dyn Fn(Value, &mut HistoryStore) -> Value + Send + Sync>;

/// Ordered composition of steps over a shared [`HistoryStore`].
#[derive(Default)]
pub struct Chain {
    steps: Vec<Step>,
    history: HistoryStore,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(mut self, step: F) -> Self
    where
        F: Fn(Value, &mut HistoryStore) -> Value + Send + Sync + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Feed `inputs` through every step in order.
    pub fn execute(&mut self, inputs: Value) -> Value {
        self.steps
            .iter()
            .fold(inputs, |context, step| step(context, &mut self.history))
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps.len())
            .field("history", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::error::LlmError;
    use serde_json::json;

    fn chain_with(model: &Arc<ScriptedModel>) -> ConversationChain {
        ConversationChain::new(model.clone(), DEFAULT_CHAIN_PROMPT)
    }

    fn contents(chain: &ConversationChain, thread: &str) -> Vec<(String, String)> {
        chain
            .memory()
            .thread(thread, None)
            .iter()
            .map(|e| (e.role.clone(), e.content.clone()))
            .collect()
    }

    #[test]
    fn context_includes_prompt_and_known_roles() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let mut chain = chain_with(&model);
        chain.add_message("user", "hi", "t", None);
        chain.add_message("tool", "ignored", "t", None);
        chain.add_message("assistant", "hello", "t", None);

        let context = chain.context("t", 10, true);
        assert_eq!(
            context,
            vec![
                Message::system(DEFAULT_CHAIN_PROMPT),
                Message::user("hi"),
                Message::assistant("hello"),
            ]
        );

        let windowed = chain.context("t", 1, false);
        assert_eq!(windowed, vec![Message::assistant("hello")]);
    }

    #[test]
    fn add_message_keeps_metadata() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let mut chain = chain_with(&model);
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!("email"));
        let index = chain.add_message("user", "hi", "t", Some(metadata));
        let entry = chain.memory().history().get(index).unwrap();
        assert_eq!(entry.metadata["source"], "email");
        assert!(entry.timestamp.is_some());
    }

    #[tokio::test]
    async fn generate_response_records_both_sides() {
        let model = Arc::new(ScriptedModel::new(&["Hi there!"]));
        let mut chain = chain_with(&model);

        let reply = chain.generate_response("Hello", "default", 10).await.unwrap();
        assert_eq!(reply, "Hi there!");
        assert_eq!(
            contents(&chain, "default"),
            vec![
                ("user".to_string(), "Hello".to_string()),
                ("assistant".to_string(), "Hi there!".to_string()),
            ]
        );

        let sent = model.requests();
        assert_eq!(
            sent[0],
            vec![Message::system(DEFAULT_CHAIN_PROMPT), Message::user("Hello")]
        );
    }

    #[tokio::test]
    async fn generate_response_does_not_duplicate_pending_query() {
        let model = Arc::new(ScriptedModel::new(&["answer"]));
        let mut chain = chain_with(&model);
        chain.add_message("user", "question", "t", None);

        chain.generate_response("question", "t", 10).await.unwrap();
        assert_eq!(chain.memory().thread("t", None).len(), 2);
        assert_eq!(model.requests()[0].len(), 2);
    }

    #[tokio::test]
    async fn llm_error_keeps_user_message_only() {
        let model = Arc::new(ScriptedModel::failing(LlmError::EmptyResponse));
        let mut chain = chain_with(&model);

        let err = chain.generate_response("Hello", "t", 10).await.unwrap_err();
        assert!(matches!(err, ChainError::Llm(LlmError::EmptyResponse)));
        assert_eq!(
            contents(&chain, "t"),
            vec![("user".to_string(), "Hello".to_string())]
        );
    }

    #[tokio::test]
    async fn search_and_respond_injects_context_after_prompt() {
        let model = Arc::new(ScriptedModel::new(&["It's Rex."]));
        let mut chain = chain_with(&model);
        chain.add_message("user", "my dog is named rex", "old", None);
        chain.add_message("assistant", "nice name", "old", None);

        let reply = chain
            .search_and_respond("what is my dog called", "new", 5, 3)
            .await
            .unwrap();
        assert_eq!(reply, "It's Rex.");

        let sent = &model.requests()[0];
        assert_eq!(sent[0], Message::system(DEFAULT_CHAIN_PROMPT));
        assert_eq!(sent[1].role, MessageRole::System);
        assert_eq!(
            sent[1].content,
            "Here are some relevant messages from our past conversation:\n\n\
             user: my dog is named rex\n\n\
             Please consider this context when responding."
        );
        assert_eq!(sent.last().unwrap(), &Message::user("what is my dog called"));
        assert_eq!(chain.memory().thread("new", None).len(), 2);
    }

    #[tokio::test]
    async fn search_without_matches_sends_plain_context() {
        let model = Arc::new(ScriptedModel::new(&["ok"]));
        let mut chain = chain_with(&model);
        chain.search_and_respond("zebra", "t", 5, 3).await.unwrap();
        assert_eq!(
            model.requests()[0],
            vec![Message::system(DEFAULT_CHAIN_PROMPT), Message::user("zebra")]
        );
    }

    #[tokio::test]
    async fn run_reports_metadata() {
        let model = Arc::new(ScriptedModel::new(&["one", "two"]));
        let mut chain = chain_with(&model);

        let plain = chain.run("first", "t", 10, false).await.unwrap();
        assert_eq!(plain.response, "one");
        assert_eq!(plain.thread_id, "t");
        assert_eq!(plain.context_window, 10);
        assert!(!plain.used_search);
        assert!(plain.processing_time >= 0.0);

        let searched = chain.run("first again", "t", 4, true).await.unwrap();
        assert_eq!(searched.response, "two");
        assert!(searched.used_search);
        // "first" matches the earlier user message.
        assert_eq!(model.requests()[1][1].role, MessageRole::System);
    }

    #[tokio::test]
    async fn summarize_uses_the_chain_model() {
        let model = Arc::new(ScriptedModel::new(&["hello", "a greeting"]));
        let mut chain = chain_with(&model);
        chain.generate_response("hi", "t", 10).await.unwrap();
        assert_eq!(chain.summarize("t").await, "a greeting");
        assert_eq!(chain.summarize("empty").await, "No messages in this thread.");
    }

    #[test]
    fn save_and_load_delegate_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let model = Arc::new(ScriptedModel::new(&[]));

        let mut chain = chain_with(&model);
        chain.add_message("user", "persist me", "t", None);
        chain.save(&path).unwrap();

        let mut restored = chain_with(&model);
        restored.load(&path).unwrap();
        assert_eq!(contents(&restored, "t"), contents(&chain, "t"));
        assert!(matches!(
            restored.load(dir.path().join("missing.json")),
            Err(ChainError::Load(_))
        ));
    }

    #[test]
    fn chain_steps_run_in_order() {
        let mut chain = Chain::new()
            .add(|mut ctx, history| {
                history.append(HistoryEntry::new("system", "step one"));
                ctx["count"] = json!(1);
                ctx
            })
            .add(|mut ctx, history| {
                let n = ctx["count"].as_i64().unwrap_or(0);
                ctx["count"] = json!(n + 1);
                history.append(HistoryEntry::reasoning("step two"));
                ctx
            });

        assert_eq!(chain.len(), 2);
        let out = chain.execute(json!({"input": "x"}));
        assert_eq!(out, json!({"input": "x", "count": 2}));
        assert_eq!(chain.history().len(), 2);
        assert_eq!(chain.history().reasoning_chain(), vec!["step two"]);
    }

    #[test]
    fn empty_chain_is_identity() {
        let mut chain = Chain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.execute(json!({"a": 1})), json!({"a": 1}));
    }
}
