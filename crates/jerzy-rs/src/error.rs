//! Error types for snapshot persistence, LLM calls, and the orchestration layer.
//!
//! Memory and cache reads never fail: absence is an empty `Vec` or `None`.
//! Only the operations that touch the filesystem or a remote model return
//! one of these.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading a memory snapshot. The in-memory state is left
/// exactly as it was before the call.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("thread '{thread}' references entry {index} but history has {len} entries")]
    DanglingIndex {
        thread: String,
        index: usize,
        len: usize,
    },
}

/// Failure while writing a memory snapshot.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to write snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure reported by a [`LanguageModel`](crate::api::LanguageModel).
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key not set: {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("LLM API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("empty LLM response")]
    EmptyResponse,
}

/// Failure from a [`ConversationChain`](crate::agent::ConversationChain) or
/// [`Agent`](crate::agent::Agent) call.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Failure while filling a [`PromptTemplate`](crate::agent::PromptTemplate).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing value for placeholder '{0}'")]
    Missing(String),

    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at byte {0}")]
    UnmatchedBrace(usize),
}

/// Failure while rendering an execution trace.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("unsupported trace format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to serialize trace: {0}")]
    Json(#[from] serde_json::Error),
}
