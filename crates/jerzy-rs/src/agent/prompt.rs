//! Prompt templates with named placeholders.
//!
//! `{name}` is replaced by the value bound to `name`; `{{` and `}}` produce
//! literal braces.
//!
//! ```
//! use std::collections::HashMap;
//! use jerzy_rs::agent::PromptTemplate;
//!
//! let template = PromptTemplate::new("Hello {name}, you have {count} new {{messages}}.");
//! let vars = HashMap::from([("name", "Ada".to_string()), ("count", "3".to_string())]);
//! assert_eq!(
//!     template.format(&vars).unwrap(),
//!     "Hello Ada, you have 3 new {messages}."
//! );
//! ```

use std::collections::HashMap;
use std::fmt::{Display, Write};

use crate::error::PromptError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance, duplicates kept.
    pub fn placeholders(&self) -> Result<Vec<String>, PromptError> {
        Ok(self
            .parse()?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name),
                Segment::Literal(_) => None,
            })
            .collect())
    }

    /// Fill every placeholder from `vars`.
    pub fn format<V: Display>(&self, vars: &HashMap<&str, V>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in self.parse()? {
            match segment {
                Segment::Literal(text) => out.push_str(&text),
                Segment::Placeholder(name) => {
                    let value = vars
                        .get(name.as_str())
                        .ok_or_else(|| PromptError::Missing(name.clone()))?;
                    let _ = write!(out, "{value}");
                }
            }
        }
        Ok(out)
    }

    fn parse(&self) -> Result<Vec<Segment>, PromptError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = self.template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.next_if(|&(_, next)| next == '{').is_some() => literal.push('{'),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => name.push(ch),
                            None => return Err(PromptError::Unclosed(pos)),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.next_if(|&(_, next)| next == '}').is_some() => literal.push('}'),
                '}' => return Err(PromptError::UnmatchedBrace(pos)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(segments)
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn fills_placeholders() {
        let t = PromptTemplate::new("Summarize {topic} in {n} words.");
        let out = t.format(&vars(&[("topic", "Rust"), ("n", "10")])).unwrap();
        assert_eq!(out, "Summarize Rust in 10 words.");
    }

    #[test]
    fn repeated_placeholder() {
        let t = PromptTemplate::new("{x} and {x}");
        assert_eq!(t.format(&vars(&[("x", "y")])).unwrap(), "y and y");
    }

    #[test]
    fn escaped_braces() {
        let t = PromptTemplate::new("{{literal}} {value}");
        assert_eq!(t.format(&vars(&[("value", "v")])).unwrap(), "{literal} v");
    }

    #[test]
    fn extra_vars_are_ignored() {
        let t = PromptTemplate::new("plain text");
        assert_eq!(t.format(&vars(&[("unused", "x")])).unwrap(), "plain text");
    }

    #[test]
    fn missing_var() {
        let t = PromptTemplate::new("Hi {name}");
        assert_eq!(
            t.format(&vars(&[])),
            Err(PromptError::Missing("name".into()))
        );
    }

    #[test]
    fn malformed_templates() {
        assert_eq!(
            PromptTemplate::new("oops {name").format(&vars(&[])),
            Err(PromptError::Unclosed(5))
        );
        assert_eq!(
            PromptTemplate::new("a } b").format(&vars(&[])),
            Err(PromptError::UnmatchedBrace(2))
        );
    }

    #[test]
    fn lists_placeholders() {
        let t = PromptTemplate::from("{a} {{b}} {c} {a}");
        assert_eq!(t.placeholders().unwrap(), vec!["a", "c", "a"]);
    }

    #[test]
    fn non_string_values() {
        let t = PromptTemplate::new("{n} items");
        let vars = HashMap::from([("n", 42)]);
        assert_eq!(t.format(&vars).unwrap(), "42 items");
    }
}
