//! Inverted keyword index for relevance search.
//!
//! Postings are built from whitespace-split, lowercased words. Punctuation is
//! kept, so `"cats"` and `"cats!"` are different postings. Scoring is looser:
//! a candidate scores one point per query word that appears anywhere in its
//! lowercased content as a substring.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::HistoryEntry;
use super::prune::rebase;

/// Unique lowercase words of `content`, split on whitespace.
pub fn tokenize(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercase query words in order, duplicates kept.
pub fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Number of query words contained in `content` (case-insensitive substring).
pub fn score(words: &[String], content: &str) -> usize {
    let content = content.to_lowercase();
    words
        .iter()
        .filter(|word| content.contains(word.as_str()))
        .count()
}

/// Word → global indices of the entries containing it, in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeywordIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every entry of a history from scratch.
    pub fn build(entries: &[HistoryEntry]) -> Self {
        let mut index = Self::new();
        for (i, entry) in entries.iter().enumerate() {
            index.index_entry(i, &entry.content);
        }
        index
    }

    /// Add `global_index` to the posting list of every word in `content`.
    pub fn index_entry(&mut self, global_index: usize, content: &str) {
        for word in tokenize(content) {
            self.postings.entry(word).or_default().push(global_index);
        }
    }

    /// Posting list for a word (exact, already lowercased). Empty if unknown.
    pub fn postings(&self, word: &str) -> &[usize] {
        self.postings
            .get(word)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Union of the posting lists of `words`, ascending.
    pub fn candidates(&self, words: &[String]) -> BTreeSet<usize> {
        words
            .iter()
            .filter_map(|word| self.postings.get(word))
            .flatten()
            .copied()
            .collect()
    }

    /// `(word, postings)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.postings
            .iter()
            .map(|(word, indices)| (word.as_str(), indices.as_slice()))
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
    }

    /// Shift postings after `removed` entries left the front of the history.
    /// Words with no remaining postings are dropped.
    pub(crate) fn rebase(&mut self, removed: usize) {
        self.postings.retain(|_, indices| {
            rebase(indices, removed);
            !indices.is_empty()
        });
    }
}
