//! Named conversation threads over the shared history.
//!
//! A thread is an ordered list of global indices into the
//! [`HistoryStore`](super::HistoryStore). Threads never own entries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::history::tail;
use super::prune::rebase;

/// Thread id → ordered global indices. Threads keep their creation order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ThreadIndex {
    threads: IndexMap<String, Vec<usize>>,
}

impl ThreadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `index` at the end of `thread_id`, creating the thread if needed.
    pub fn record(&mut self, thread_id: &str, index: usize) {
        self.threads
            .entry(thread_id.to_string())
            .or_default()
            .push(index);
    }

    /// All indices of a thread. Unknown threads are empty.
    pub fn indices(&self, thread_id: &str) -> &[usize] {
        self.threads
            .get(thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The last `last_n` indices of a thread (all when `None`).
    pub fn tail(&self, thread_id: &str, last_n: Option<usize>) -> &[usize] {
        tail(self.indices(thread_id), last_n)
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.threads.contains_key(thread_id)
    }

    /// Thread ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.threads.keys().map(String::as_str)
    }

    /// `(thread_id, indices)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.threads
            .iter()
            .map(|(id, indices)| (id.as_str(), indices.as_slice()))
    }

    /// Number of threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Forget indices below `removed` and shift the rest down. Threads that
    /// end up empty are kept.
    pub(crate) fn rebase(&mut self, removed: usize) {
        for indices in self.threads.values_mut() {
            rebase(indices, removed);
        }
    }

    /// First `(thread_id, index)` pair that does not fit a history of `len`
    /// entries.
    pub(crate) fn first_out_of_range(&self, len: usize) -> Option<(&str, usize)> {
        self.iter().find_map(|(id, indices)| {
            indices.iter().find(|&&i| i >= len).map(|&i| (id, i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_tail() {
        let mut threads = ThreadIndex::new();
        threads.record("a", 0);
        threads.record("b", 1);
        threads.record("a", 2);
        threads.record("a", 3);

        assert_eq!(threads.indices("a"), &[0, 2, 3]);
        assert_eq!(threads.tail("a", Some(2)), &[2, 3]);
        assert_eq!(threads.tail("a", None), &[0, 2, 3]);
        assert_eq!(threads.indices("b"), &[1]);
        assert!(threads.indices("missing").is_empty());
    }

    #[test]
    fn ids_keep_creation_order() {
        let mut threads = ThreadIndex::new();
        threads.record("zeta", 0);
        threads.record("alpha", 1);
        let ids: Vec<&str> = threads.ids().collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn rebase_drops_and_shifts() {
        let mut threads = ThreadIndex::new();
        for (thread, index) in [("a", 0), ("b", 1), ("a", 2), ("b", 3), ("a", 4)] {
            threads.record(thread, index);
        }
        threads.rebase(2);
        assert_eq!(threads.indices("a"), &[0, 2]);
        assert_eq!(threads.indices("b"), &[1]);
    }

    #[test]
    fn rebase_keeps_emptied_threads() {
        let mut threads = ThreadIndex::new();
        threads.record("old", 0);
        threads.record("new", 1);
        threads.rebase(1);
        assert!(threads.contains("old"));
        assert!(threads.indices("old").is_empty());
        assert_eq!(threads.indices("new"), &[0]);
    }

    #[test]
    fn out_of_range_detection() {
        let mut threads = ThreadIndex::new();
        threads.record("a", 0);
        threads.record("b", 5);
        assert_eq!(threads.first_out_of_range(3), Some(("b", 5)));
        assert_eq!(threads.first_out_of_range(6), None);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut threads = ThreadIndex::new();
        threads.record("default", 0);
        let json = serde_json::to_string(&threads).unwrap();
        assert_eq!(json, r#"{"default":[0]}"#);
    }
}
