//! Execution traces: a readable account of what an agent thought and did.
//!
//! [`Trace`] borrows a [`HistoryStore`] and renders it in one of three
//! [`TraceFormat`]s. Text and markdown are meant for people; JSON is the raw
//! history.

use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;
use crate::memory::{HistoryEntry, HistoryStore};

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Text,
    Markdown,
    Json,
}

impl FromStr for TraceFormat {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(TraceFormat::Text),
            "markdown" => Ok(TraceFormat::Markdown),
            "json" => Ok(TraceFormat::Json),
            other => Err(TraceError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFormat::Text => write!(f, "text"),
            TraceFormat::Markdown => write!(f, "markdown"),
            TraceFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    history: &'a HistoryStore,
}

impl<'a> Trace<'a> {
    pub fn new(history: &'a HistoryStore) -> Self {
        Self { history }
    }

    /// Every entry, oldest first.
    pub fn full(&self) -> &'a [HistoryEntry] {
        self.history.entries()
    }

    /// Reasoning steps with the `Reasoning:` prefix stripped.
    pub fn reasoning(&self) -> Vec<String> {
        self.history.reasoning_chain()
    }

    /// Tool calls and their results, interleaved.
    pub fn tools(&self) -> Vec<&'a HistoryEntry> {
        self.history.tool_trace()
    }

    pub fn render(&self, format: TraceFormat) -> Result<String, TraceError> {
        match format {
            TraceFormat::Text => Ok(self.text()),
            TraceFormat::Markdown => Ok(self.markdown()),
            TraceFormat::Json => Ok(serde_json::to_string_pretty(self.full())?),
        }
    }

    fn text(&self) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut lines = Vec::with_capacity(self.history.len() * 2);
        for entry in self.full() {
            let line = if entry.is_reasoning() {
                format!("🧠 REASONING: {}", entry.content)
            } else if entry.is_tool_call() {
                format!(
                    "🛠️ TOOL CALL ({}): {}",
                    entry.tool_name().unwrap_or("unknown"),
                    entry.content
                )
            } else if entry.content.contains(crate::memory::TOOL_RESULT_MARKER) {
                format!("📊 RESULT{}: {}", cached_suffix(entry), entry.tool_result_text())
            } else {
                format!("{}: {}", entry.role.to_uppercase(), entry.content)
            };
            lines.push(line);
            lines.push(rule.clone());
        }
        lines.join("\n")
    }

    fn markdown(&self) -> String {
        let mut lines = vec!["# Execution Trace".to_string(), String::new()];
        let mut step = 1;

        for entry in self.full() {
            if entry.is_reasoning() {
                lines.push(format!("## Step {step}: Reasoning"));
                lines.push(format!("_{}_", entry.content));
                step += 1;
            } else if entry.is_tool_call() {
                lines.push(format!(
                    "## Step {step}: Tool Call - {}",
                    entry.tool_name().unwrap_or("unknown")
                ));
                let args = entry
                    .metadata
                    .get("args")
                    .map_or_else(|| "{}".to_string(), |a| a.to_string());
                lines.push(format!("**Parameters:** {args}"));
                step += 1;
            } else if entry.content.contains(crate::memory::TOOL_RESULT_MARKER) {
                lines.push(format!("### Result{}", cached_suffix(entry)));
                lines.push(format!("```\n{}\n```", entry.tool_result_text()));
            } else if entry.role.eq_ignore_ascii_case("user") {
                lines.push("## Query".to_string());
                lines.push(format!("> {}", entry.content));
            } else if entry.role.eq_ignore_ascii_case("assistant")
                && !entry.content.contains("Used tool:")
            {
                lines.push("## Final Answer".to_string());
                lines.push(entry.content.clone());
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

fn cached_suffix(entry: &HistoryEntry) -> &'static str {
    if entry.was_cached() { " (CACHED)" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> HistoryStore {
        let mut store = HistoryStore::new();
        store.append(HistoryEntry::new("user", "What is 2+2?"));
        store.append(HistoryEntry::reasoning("I should use the calculator"));
        store.append(HistoryEntry::tool_call("calculator", &json!({"expr": "2+2"})));
        store.append(HistoryEntry::tool_result("calculator", "4", true));
        store.append(HistoryEntry::new("assistant", "The answer is 4."));
        store
    }

    #[test]
    fn format_names() {
        assert_eq!("text".parse::<TraceFormat>().unwrap(), TraceFormat::Text);
        assert_eq!("markdown".parse::<TraceFormat>().unwrap(), TraceFormat::Markdown);
        assert_eq!("json".parse::<TraceFormat>().unwrap(), TraceFormat::Json);
        match "yaml".parse::<TraceFormat>() {
            Err(TraceError::UnsupportedFormat(name)) => assert_eq!(name, "yaml"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
        assert_eq!(TraceFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn text_rendering() {
        let store = sample();
        let text = Trace::new(&store).render(TraceFormat::Text).unwrap();
        let rule = "-".repeat(50);
        let rule = rule.as_str();
        let expected = [
            "USER: What is 2+2?",
            rule,
            "🧠 REASONING: Reasoning: I should use the calculator",
            rule,
            "🛠️ TOOL CALL (calculator): Used tool: calculator",
            rule,
            "📊 RESULT (CACHED): 4",
            rule,
            "ASSISTANT: The answer is 4.",
            rule,
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn markdown_rendering() {
        let store = sample();
        let md = Trace::new(&store).render(TraceFormat::Markdown).unwrap();
        let expected = [
            "# Execution Trace",
            "",
            "## Query",
            "> What is 2+2?",
            "",
            "## Step 1: Reasoning",
            "_Reasoning: I should use the calculator_",
            "",
            "## Step 2: Tool Call - calculator",
            r#"**Parameters:** {"expr":"2+2"}"#,
            "",
            "### Result (CACHED)",
            "```\n4\n```",
            "",
            "## Final Answer",
            "The answer is 4.",
            "",
        ]
        .join("\n");
        assert_eq!(md, expected);
    }

    #[test]
    fn markdown_skips_tool_announcements() {
        let mut store = HistoryStore::new();
        store.append(HistoryEntry::new("assistant", "Used tool: search"));
        let md = Trace::new(&store).render(TraceFormat::Markdown).unwrap();
        assert!(!md.contains("Final Answer"));
    }

    #[test]
    fn json_rendering_is_the_history() {
        let store = sample();
        let json = Trace::new(&store).render(TraceFormat::Json).unwrap();
        let parsed: Vec<HistoryEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, store.entries());
    }

    #[test]
    fn views() {
        let store = sample();
        let trace = Trace::new(&store);
        assert_eq!(trace.full().len(), 5);
        assert_eq!(trace.reasoning(), vec!["I should use the calculator"]);
        assert_eq!(trace.tools().len(), 2);
    }

    #[test]
    fn empty_history() {
        let store = HistoryStore::new();
        let trace = Trace::new(&store);
        assert_eq!(trace.render(TraceFormat::Text).unwrap(), "");
        assert_eq!(
            trace.render(TraceFormat::Markdown).unwrap(),
            "# Execution Trace\n"
        );
        assert_eq!(trace.render(TraceFormat::Json).unwrap(), "[]");
    }
}
