//! Append-only JSONL audit log of tool invocations.
//!
//! Each call to [`ToolCallLog::record`] writes one line:
//!
//! ```json
//! {"tool":"search","args":{"q":"rust"},"result":["..."],"status":"success","duration_sec":0.0123,"timestamp":"2025-01-01 12:00:00"}
//! ```
//!
//! A failed tool yields `{"error": "<message>"}` as its result with status
//! `error`. Failing to write the log never fails the call.

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::LoadError;

fn error_value(error: &impl Display) -> Value {
    json!({ "error": error.to_string() })
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "success"),
            ToolStatus::Error => write!(f, "error"),
        }
    }
}

/// One line of the log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: Value,
    pub result: Value,
    pub status: ToolStatus,
    /// Wall-clock duration, rounded to 4 decimal places.
    pub duration_sec: f64,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct ToolCallLog {
    path: PathBuf,
}

impl ToolCallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a synchronous tool and log the outcome.
    pub fn record<E, F>(&self, tool: &str, args: &Value, op: F) -> Value
    where
        F: FnOnce() -> Result<Value, E>,
        E: Display,
    {
        let start = Instant::now();
        let outcome = op();
        self.finish(tool, args, outcome, start)
    }

    /// Run an async tool and log the outcome.
    pub async fn record_async<E, F, Fut>(&self, tool: &str, args: &Value, op: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        let start = Instant::now();
        let outcome = op().await;
        self.finish(tool, args, outcome, start)
    }

    fn finish<E: Display>(
        &self,
        tool: &str,
        args: &Value,
        outcome: Result<Value, E>,
        start: Instant,
    ) -> Value {
        self.log_outcome(tool, args, &outcome, start.elapsed());
        outcome.unwrap_or_else(|e| error_value(&e))
    }

    /// Log an outcome produced elsewhere, leaving the result with the caller.
    pub fn log_outcome<E: Display>(
        &self,
        tool: &str,
        args: &Value,
        outcome: &Result<Value, E>,
        elapsed: Duration,
    ) {
        match outcome {
            Ok(value) => self.write(tool, args, value, ToolStatus::Success, elapsed),
            Err(e) => self.write(tool, args, &error_value(e), ToolStatus::Error, elapsed),
        }
    }

    fn write(
        &self,
        tool: &str,
        args: &Value,
        result: &Value,
        status: ToolStatus,
        elapsed: Duration,
    ) {
        let duration = elapsed.as_secs_f64();
        let record = ToolCallRecord {
            tool: tool.to_string(),
            args: args.clone(),
            result: result.clone(),
            status,
            duration_sec: (duration * 10_000.0).round() / 10_000.0,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        if let Err(e) = self.append(&record) {
            warn!("Failed to write tool log {}: {e}", self.path.display());
        }
        info!("[{tool}] status={status} duration={duration:.2}s");
    }

    fn append(&self, record: &ToolCallRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Read every record back. A missing file is an empty log.
    pub fn records(&self) -> Result<Vec<ToolCallRecord>, LoadError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LoadError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| LoadError::Parse {
                    path: self.path.clone(),
                    source,
                })
            })
            .collect()
    }
}
