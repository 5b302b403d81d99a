//! Versioned key-value state for an agent run.
//!
//! [`AgentState`] is a JSON object tree addressed by dotted keys
//! (`"user.prefs.theme"`). Every write bumps a version counter and appends a
//! [`StateChange`] to an in-memory log.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::memory::history::now_timestamp;

/// One entry of the change log. `version` is the state version before the
/// write was applied.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StateChange {
    pub action: String,
    pub key: String,
    pub value: Value,
    pub timestamp: String,
    pub version: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AgentState {
    data: Map<String, Value>,
    history: Vec<StateChange>,
    version: u64,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `key`. Missing or non-object intermediates along a
    /// dotted path are replaced with empty objects.
    pub fn set(&mut self, key: &str, value: Value) {
        let parts: Vec<&str> = key.split('.').collect();
        set_path(&mut self.data, &parts, value.clone());

        self.history.push(StateChange {
            action: "set".to_string(),
            key: key.to_string(),
            value,
            timestamp: now_timestamp(),
            version: self.version,
        });
        self.version += 1;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.data.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append to the array at `key`. A missing key starts a new array; a
    /// scalar becomes the first element.
    pub fn append_to(&mut self, key: &str, value: Value) {
        let mut items = match self.get(key).cloned() {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
        };
        items.push(value);
        self.set(key, Value::Array(items));
    }

    /// Deep copy of the whole tree.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Number of writes so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &[StateChange] {
        &self.history
    }
}

fn set_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                set_path(child, rest, value);
            }
        }
    }
}
