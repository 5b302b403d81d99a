//! Conversation memory: history, threads, keyword recall, pruning, snapshots.
//!
//! [`ConversationMemory`] is the single session object that owns every
//! memory structure:
//!
//! - [`history`]: [`HistoryStore`], the append-only owner of entries.
//! - [`threads`]: [`ThreadIndex`], named conversation lines as index lists.
//! - [`keywords`]: [`KeywordIndex`], the inverted word index behind
//!   [`ConversationMemory::find_relevant`].
//! - [`prune`]: [`ConversationMemory::prune`], front trimming with rebasing.
//! - [`snapshot`]: JSON save/load with a full keyword rebuild on load.
//!
//! The indexes hold global positions, never copies, and are only mutated
//! through `&mut ConversationMemory`, so appends and prunes cannot interleave.

pub mod history;
pub mod keywords;
pub mod prune;
pub mod snapshot;
pub mod threads;

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::Message;
use crate::api::LanguageModel;

pub use history::{HistoryEntry, HistoryStore, REASONING, TOOL_CALL, TOOL_RESULT_MARKER};
pub use keywords::KeywordIndex;
pub use snapshot::Snapshot;
pub use threads::ThreadIndex;

/// Thread used when a caller does not name one.
pub const DEFAULT_THREAD: &str = "default";

/// Configuration for [`ConversationMemory`].
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Target size for [`ConversationMemory::prune_to_limit`]. Default: `100`.
    pub max_history_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: 100,
        }
    }
}

impl MemoryConfig {
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history_length = max;
        self
    }
}

/// Session-scoped memory for one conversation agent.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    history: HistoryStore,
    threads: ThreadIndex,
    keywords: KeywordIndex,
    current_thread: String,
    /// Free-form facts stored with [`remember`](Self::remember). Not persisted.
    facts: HashMap<String, Value>,
    config: MemoryConfig,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            history: HistoryStore::new(),
            threads: ThreadIndex::new(),
            keywords: KeywordIndex::new(),
            current_thread: DEFAULT_THREAD.to_string(),
            facts: HashMap::new(),
            config,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn threads(&self) -> &ThreadIndex {
        &self.threads
    }

    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn current_thread(&self) -> &str {
        &self.current_thread
    }

    pub fn set_current_thread(&mut self, thread_id: impl Into<String>) {
        self.current_thread = thread_id.into();
    }

    /// Store a fact under `key`, replacing any previous value.
    pub fn remember(&mut self, key: impl Into<String>, value: Value) {
        self.facts.insert(key.into(), value);
    }

    pub fn recall(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    /// Append an entry to the history, record it on `thread_id`, and index
    /// its words. Returns the entry's global index.
    pub fn append_to_thread(&mut self, thread_id: &str, entry: HistoryEntry) -> usize {
        let index = self.history.append(entry);
        self.threads.record(thread_id, index);
        if let Some(entry) = self.history.get(index) {
            self.keywords.index_entry(index, &entry.content);
        }
        index
    }

    /// Entries of a thread, oldest first. `last_n` keeps only the newest
    /// `last_n` of them. Unknown threads are empty.
    pub fn thread(&self, thread_id: &str, last_n: Option<usize>) -> Vec<&HistoryEntry> {
        self.threads
            .tail(thread_id, last_n)
            .iter()
            .filter_map(|&i| self.history.get(i))
            .collect()
    }

    /// Up to `top_k` entries ranked by how many query words they contain.
    ///
    /// Candidates come from the keyword index; each is scored by substring
    /// containment of the query words in its lowercased content. Equal scores
    /// are ordered by ascending global index. Entries scoring zero are
    /// never returned.
    pub fn find_relevant(&self, query: &str, top_k: usize) -> Vec<&HistoryEntry> {
        let words = keywords::query_words(query);
        let mut scored: Vec<(usize, usize)> = self
            .keywords
            .candidates(&words)
            .into_iter()
            .filter_map(|i| {
                self.history
                    .get(i)
                    .map(|entry| (i, keywords::score(&words, &entry.content)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        debug!(
            "Relevance search: {} candidate(s) for {} query word(s)",
            scored.len(),
            words.len()
        );

        scored
            .into_iter()
            .take(top_k)
            .filter(|&(_, score)| score > 0)
            .filter_map(|(i, _)| self.history.get(i))
            .collect()
    }

    /// Summarize a thread, optionally with an LLM.
    ///
    /// Never fails: without a model, or when the model call errors, a
    /// deterministic message reporting the thread's size is returned.
    pub async fn summarize_thread(
        &self,
        thread_id: &str,
        llm: Option<&dyn LanguageModel>,
    ) -> String {
        let thread = self.thread(thread_id, None);
        if thread.is_empty() {
            return "No messages in this thread.".to_string();
        }
        let count = thread.len();

        let Some(llm) = llm else {
            return format!("Thread with {count} messages");
        };

        let request = vec![Message::user(summarization_prompt(&thread))];
        match llm.generate(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Thread summary for '{thread_id}' failed: {e}");
                format!("Error generating summary: {e}. Thread has {count} messages.")
            }
        }
    }

    /// Replace history, threads and current thread wholesale, then rebuild
    /// the keyword index from the new history.
    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.history = HistoryStore::from_entries(snapshot.history);
        self.threads = snapshot.threads;
        self.current_thread = snapshot.current_thread;
        self.keywords = KeywordIndex::build(self.history.entries());
    }
}

fn summarization_prompt(thread: &[&HistoryEntry]) -> String {
    let conversation: Vec<String> = thread
        .iter()
        .map(|entry| {
            let role = if entry.role.is_empty() {
                "unknown"
            } else {
                entry.role.as_str()
            };
            format!("{role}: {}", entry.content)
        })
        .collect();
    format!(
        "Please summarize the following conversation:\n\n{}\n\nSummary:",
        conversation.join("\n")
    )
}
