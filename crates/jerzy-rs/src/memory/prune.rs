//! History pruning with index rebasing.
//!
//! Removing entries from the front of the history shifts every global index.
//! [`ConversationMemory::prune`] drops the entries and rebases the thread
//! index, the keyword index and the classified views in the same call.

use tracing::debug;

use super::ConversationMemory;

/// Drop indices below `removed` and subtract `removed` from the survivors.
pub(crate) fn rebase(indices: &mut Vec<usize>, removed: usize) {
    if removed == 0 {
        return;
    }
    indices.retain(|&i| i >= removed);
    for index in indices.iter_mut() {
        *index -= removed;
    }
}

impl ConversationMemory {
    /// Keep only the newest `keep_last_n` entries.
    ///
    /// No-op for `None`, `Some(0)`, or when the history is already short
    /// enough. Returns the number of entries removed.
    pub fn prune(&mut self, keep_last_n: Option<usize>) -> usize {
        let keep = match keep_last_n {
            Some(keep) if keep > 0 => keep,
            _ => return 0,
        };
        let len = self.history.len();
        if len <= keep {
            return 0;
        }

        let removed = len - keep;
        self.history.drop_front(removed);
        self.threads.rebase(removed);
        self.keywords.rebase(removed);
        debug!("Pruned {removed} history entries, {keep} remain");
        removed
    }

    /// Prune down to the configured `max_history_length`.
    pub fn prune_to_limit(&mut self) -> usize {
        self.prune(Some(self.config.max_history_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HistoryEntry, MemoryConfig};

    fn memory_with(messages: &[(&str, &str)]) -> ConversationMemory {
        let mut memory = ConversationMemory::default();
        for (thread, content) in messages {
            memory.append_to_thread(thread, HistoryEntry::new("user", *content));
        }
        memory
    }

    /// Every stored index must resolve to the entry that carried `content`
    /// when it was appended.
    fn assert_consistent(memory: &ConversationMemory) {
        let len = memory.history().len();
        for (_, indices) in memory.threads().iter() {
            assert!(indices.iter().all(|&i| i < len));
        }
        for (word, postings) in memory.keywords().iter() {
            for &i in postings {
                let entry = memory.history().get(i).expect("posting in range");
                assert!(
                    entry
                        .content
                        .to_lowercase()
                        .split_whitespace()
                        .any(|w| w == word),
                    "posting for '{word}' points at '{}'",
                    entry.content
                );
            }
        }
    }

    #[test]
    fn rebase_helper() {
        let mut indices = vec![0, 1, 3, 5];
        rebase(&mut indices, 2);
        assert_eq!(indices, vec![1, 3]);

        let mut untouched = vec![0, 1];
        rebase(&mut untouched, 0);
        assert_eq!(untouched, vec![0, 1]);
    }

    #[test]
    fn prune_noop_cases() {
        let mut memory = memory_with(&[("a", "one"), ("a", "two")]);
        assert_eq!(memory.prune(None), 0);
        assert_eq!(memory.prune(Some(0)), 0);
        assert_eq!(memory.prune(Some(2)), 0);
        assert_eq!(memory.prune(Some(10)), 0);
        assert_eq!(memory.history().len(), 2);
    }

    #[test]
    fn prune_rebases_threads_and_keywords() {
        let mut memory = memory_with(&[
            ("a", "alpha apple"),
            ("b", "bravo banana"),
            ("a", "charlie apple"),
            ("b", "delta banana"),
            ("a", "echo apple"),
        ]);

        assert_eq!(memory.prune(Some(3)), 2);
        assert_eq!(memory.history().len(), 3);

        let thread_a: Vec<&str> = memory
            .thread("a", None)
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(thread_a, vec!["charlie apple", "echo apple"]);

        let thread_b: Vec<&str> = memory
            .thread("b", None)
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(thread_b, vec!["delta banana"]);

        assert_eq!(memory.keywords().postings("apple"), &[0, 2]);
        assert_eq!(memory.keywords().postings("banana"), &[1]);
        assert!(memory.keywords().postings("alpha").is_empty());
        assert!(memory.keywords().postings("bravo").is_empty());
        assert_consistent(&memory);
    }

    #[test]
    fn prune_is_idempotent() {
        let mut memory = memory_with(&[("a", "1"), ("a", "2"), ("a", "3"), ("a", "4")]);
        memory.prune(Some(2));
        let after_first: Vec<String> = memory
            .history()
            .entries()
            .iter()
            .map(|e| e.content.clone())
            .collect();
        assert_eq!(memory.prune(Some(2)), 0);
        let after_second: Vec<String> = memory
            .history()
            .entries()
            .iter()
            .map(|e| e.content.clone())
            .collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn repeated_prunes_with_appends_stay_consistent() {
        let mut memory = ConversationMemory::default();
        for round in 0..20 {
            let thread = if round % 3 == 0 { "x" } else { "y" };
            memory.append_to_thread(
                thread,
                HistoryEntry::new("user", format!("message number{round} common")),
            );
            if round % 4 == 3 {
                memory.prune(Some(5));
                assert_consistent(&memory);
            }
        }
        assert_consistent(&memory);
        assert!(memory.history().len() <= 8);
    }

    #[test]
    fn prune_to_limit_uses_config() {
        let mut memory = ConversationMemory::new(MemoryConfig::default().with_max_history(2));
        for i in 0..5 {
            memory.append_to_thread("t", HistoryEntry::new("user", format!("m{i}")));
        }
        assert_eq!(memory.prune_to_limit(), 3);
        assert_eq!(memory.thread("t", None).len(), 2);
    }
}
