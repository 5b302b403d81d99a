//! Append-only conversation history.
//!
//! [`HistoryStore`] owns every [`HistoryEntry`]. An entry's position in the
//! store is its *global index*; the thread and keyword indexes refer to
//! entries only through these positions. Entries are classified as they
//! arrive so reasoning steps and tool calls can be listed without a scan.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::prune::rebase;

/// Entry type for a model reasoning step.
pub const REASONING: &str = "reasoning";
/// Entry type for a tool invocation.
pub const TOOL_CALL: &str = "tool_call";

/// Marker carried by system entries that hold a tool's output.
pub const TOOL_RESULT_MARKER: &str = "Tool result:";
/// Prefix stripped from reasoning content when it is read back.
pub const REASONING_PREFIX: &str = "Reasoning:";

/// A single history record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Speaker: `user`, `assistant`, `system`, or anything a caller chooses.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    /// Optional classification such as [`REASONING`] or [`TOOL_CALL`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// ISO-8601 timestamp. Filled in on append when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            kind: None,
            timestamp: None,
            metadata: Map::new(),
        }
    }

    /// A reasoning step, stored with the `Reasoning:` prefix.
    pub fn reasoning(thought: impl AsRef<str>) -> Self {
        Self::new("assistant", format!("{REASONING_PREFIX} {}", thought.as_ref()))
            .with_kind(REASONING)
    }

    /// A tool invocation. The tool name and arguments go into metadata.
    pub fn tool_call(tool: &str, args: &Value) -> Self {
        Self::new("assistant", format!("Used tool: {tool}"))
            .with_kind(TOOL_CALL)
            .with_metadata("tool", Value::String(tool.to_string()))
            .with_metadata("args", args.clone())
    }

    /// The output of a tool, as a system entry carrying [`TOOL_RESULT_MARKER`].
    pub fn tool_result(tool: &str, result: impl AsRef<str>, cached: bool) -> Self {
        Self::new(
            "system",
            format!("{TOOL_RESULT_MARKER} {}", result.as_ref()),
        )
        .with_metadata("tool", Value::String(tool.to_string()))
        .with_metadata("cached", Value::Bool(cached))
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_reasoning(&self) -> bool {
        self.kind.as_deref() == Some(REASONING)
    }

    pub fn is_tool_call(&self) -> bool {
        self.kind.as_deref() == Some(TOOL_CALL)
    }

    /// A system entry holding tool output.
    pub fn is_tool_result(&self) -> bool {
        self.role == "system" && self.content.contains(TOOL_RESULT_MARKER)
    }

    /// Reasoning content without the `Reasoning:` prefix.
    pub fn reasoning_text(&self) -> &str {
        self.content
            .strip_prefix(REASONING_PREFIX)
            .unwrap_or(&self.content)
            .trim()
    }

    /// Tool output without the marker.
    pub fn tool_result_text(&self) -> String {
        self.content.replace(TOOL_RESULT_MARKER, "").trim().to_string()
    }

    /// Tool name recorded in metadata, if any.
    pub fn tool_name(&self) -> Option<&str> {
        self.metadata.get("tool").and_then(Value::as_str)
    }

    /// Whether a tool result was served from the cache.
    pub fn was_cached(&self) -> bool {
        self.metadata
            .get("cached")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Current time as an ISO-8601 string.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Owner of all history entries plus the reasoning and tool-call views.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    reasoning: Vec<usize>,
    tool_calls: Vec<usize>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously saved entries, keeping their
    /// timestamps as they are.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.push(entry);
        }
        store
    }

    /// Append an entry, stamping it with the current time if it has none.
    /// Returns the entry's global index.
    pub fn append(&mut self, mut entry: HistoryEntry) -> usize {
        if entry.timestamp.is_none() {
            entry.timestamp = Some(now_timestamp());
        }
        self.push(entry)
    }

    fn push(&mut self, entry: HistoryEntry) -> usize {
        let index = self.entries.len();
        if entry.is_reasoning() {
            self.reasoning.push(index);
        } else if entry.is_tool_call() {
            self.tool_calls.push(index);
        }
        self.entries.push(entry);
        index
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filter by entry type (when `types` is non-empty), then keep the last
    /// `last_n` matches. Order is preserved.
    pub fn query(&self, last_n: Option<usize>, types: Option<&[&str]>) -> Vec<&HistoryEntry> {
        let matching: Vec<&HistoryEntry> = match types {
            Some(types) if !types.is_empty() => self
                .entries
                .iter()
                .filter(|e| e.kind.as_deref().is_some_and(|k| types.contains(&k)))
                .collect(),
            _ => self.entries.iter().collect(),
        };
        tail(&matching, last_n).to_vec()
    }

    /// Entries classified as reasoning, oldest first.
    pub fn reasoning_steps(&self) -> Vec<&HistoryEntry> {
        self.resolve(&self.reasoning)
    }

    /// Entries classified as tool calls, oldest first.
    pub fn tool_calls(&self) -> Vec<&HistoryEntry> {
        self.resolve(&self.tool_calls)
    }

    /// Content of the most recent reasoning entry, prefix stripped.
    pub fn last_reasoning(&self) -> Option<String> {
        self.reasoning
            .last()
            .and_then(|&i| self.entries.get(i))
            .map(|e| e.reasoning_text().to_string())
    }

    /// All reasoning content in chronological order, prefix stripped.
    pub fn reasoning_chain(&self) -> Vec<String> {
        self.reasoning_steps()
            .into_iter()
            .map(|e| e.reasoning_text().to_string())
            .collect()
    }

    /// Distinct tool outputs recorded as system entries, first-seen order.
    /// With `tool_name`, only entries whose content mentions it are kept.
    pub fn unique_tool_results(&self, tool_name: Option<&str>) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.is_tool_result())
            .filter(|e| tool_name.is_none_or(|name| e.content.contains(name)))
            .map(HistoryEntry::tool_result_text)
            .filter(|text| seen.insert(text.clone()))
            .collect()
    }

    /// Tool calls and tool results interleaved in history order.
    pub fn tool_trace(&self) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_tool_call() || e.is_tool_result())
            .collect()
    }

    /// Drop the oldest `count` entries and shift the classified views to match.
    pub(crate) fn drop_front(&mut self, count: usize) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
        rebase(&mut self.reasoning, count);
        rebase(&mut self.tool_calls, count);
    }

    fn resolve(&self, indices: &[usize]) -> Vec<&HistoryEntry> {
        indices.iter().filter_map(|&i| self.entries.get(i)).collect()
    }
}

/// The last `n` items of a slice, or all of it when `n` is `None`.
pub(crate) fn tail<T>(items: &[T], n: Option<usize>) -> &[T] {
    match n {
        Some(n) => &items[items.len().saturating_sub(n)..],
        None => items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(entries: Vec<HistoryEntry>) -> HistoryStore {
        let mut store = HistoryStore::new();
        for entry in entries {
            store.append(entry);
        }
        store
    }

    #[test]
    fn append_returns_sequential_indices() {
        let mut store = HistoryStore::new();
        assert_eq!(store.append(HistoryEntry::new("user", "a")), 0);
        assert_eq!(store.append(HistoryEntry::new("assistant", "b")), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn append_stamps_missing_timestamp_only() {
        let mut store = HistoryStore::new();
        store.append(HistoryEntry::new("user", "a"));
        store.append(HistoryEntry::new("user", "b").with_timestamp("2024-01-01T00:00:00"));

        assert!(store.get(0).unwrap().timestamp.is_some());
        assert_eq!(
            store.get(1).unwrap().timestamp.as_deref(),
            Some("2024-01-01T00:00:00")
        );
    }

    #[test]
    fn empty_content_is_accepted() {
        let mut store = HistoryStore::new();
        store.append(HistoryEntry::new("user", ""));
        assert_eq!(store.get(0).unwrap().content, "");
    }

    #[test]
    fn classification_views() {
        let store = store_with(vec![
            HistoryEntry::new("user", "question"),
            HistoryEntry::reasoning("think first"),
            HistoryEntry::tool_call("search", &json!({"q": "x"})),
            HistoryEntry::reasoning("then act"),
        ]);
        assert_eq!(store.reasoning_steps().len(), 2);
        assert_eq!(store.tool_calls().len(), 1);
        assert_eq!(store.tool_calls()[0].tool_name(), Some("search"));
    }

    #[test]
    fn query_filters_then_takes_last() {
        let store = store_with(vec![
            HistoryEntry::new("user", "1"),
            HistoryEntry::reasoning("2"),
            HistoryEntry::new("user", "3"),
            HistoryEntry::reasoning("4"),
            HistoryEntry::reasoning("5"),
        ]);

        let all = store.query(None, None);
        assert_eq!(all.len(), 5);

        let last_two = store.query(Some(2), None);
        assert_eq!(last_two[0].content, "Reasoning: 4");

        let reasoning = store.query(Some(2), Some(&[REASONING]));
        let texts: Vec<&str> = reasoning.iter().map(|e| e.reasoning_text()).collect();
        assert_eq!(texts, vec!["4", "5"]);

        assert_eq!(store.query(None, Some(&[])).len(), 5);
        assert!(store.query(Some(0), None).is_empty());
        assert_eq!(store.query(Some(100), None).len(), 5);
    }

    #[test]
    fn last_reasoning_and_chain() {
        let mut store = HistoryStore::new();
        assert_eq!(store.last_reasoning(), None);

        store.append(HistoryEntry::reasoning("first"));
        store.append(HistoryEntry::new("assistant", "answer"));
        store.append(HistoryEntry::new("assistant", "Reasoning:   second  ").with_kind(REASONING));

        assert_eq!(store.last_reasoning().as_deref(), Some("second"));
        assert_eq!(store.reasoning_chain(), vec!["first", "second"]);
    }

    #[test]
    fn reasoning_without_prefix_is_returned_trimmed() {
        let store = store_with(vec![
            HistoryEntry::new("assistant", " plain thought ").with_kind(REASONING),
        ]);
        assert_eq!(store.last_reasoning().as_deref(), Some("plain thought"));
    }

    #[test]
    fn unique_tool_results_dedupes_in_first_seen_order() {
        let store = store_with(vec![
            HistoryEntry::tool_result("weather", "weather: 12C", false),
            HistoryEntry::tool_result("stocks", "stocks: up", false),
            HistoryEntry::tool_result("weather", "weather: 12C", true),
            HistoryEntry::new("user", "Tool result: not a system entry"),
        ]);

        assert_eq!(
            store.unique_tool_results(None),
            vec!["weather: 12C", "stocks: up"]
        );
        assert_eq!(store.unique_tool_results(Some("stocks")), vec!["stocks: up"]);
        assert!(store.unique_tool_results(Some("calendar")).is_empty());
    }

    #[test]
    fn tool_trace_keeps_calls_and_results() {
        let store = store_with(vec![
            HistoryEntry::new("user", "hi"),
            HistoryEntry::tool_call("search", &json!({})),
            HistoryEntry::tool_result("search", "found", false),
            HistoryEntry::new("assistant", "done"),
        ]);
        let trace = store.tool_trace();
        assert_eq!(trace.len(), 2);
        assert!(trace[0].is_tool_call());
        assert!(trace[1].is_tool_result());
    }

    #[test]
    fn drop_front_rebases_views() {
        let mut store = store_with(vec![
            HistoryEntry::reasoning("old"),
            HistoryEntry::new("user", "x"),
            HistoryEntry::reasoning("new"),
            HistoryEntry::tool_call("t", &json!({})),
        ]);
        store.drop_front(2);

        assert_eq!(store.len(), 2);
        assert_eq!(store.reasoning_chain(), vec!["new"]);
        assert_eq!(store.tool_calls().len(), 1);
    }

    #[test]
    fn entry_serializes_type_field() {
        let entry = HistoryEntry::new("assistant", "x").with_kind(TOOL_CALL);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert!(value.get("metadata").is_none());

        let parsed: HistoryEntry =
            serde_json::from_value(json!({"content": "bare"})).unwrap();
        assert_eq!(parsed.role, "");
        assert_eq!(parsed.kind, None);
    }
}
