//! JSON snapshots of conversation memory.
//!
//! A snapshot holds the history, the thread index and the current thread id.
//! The keyword index is not saved; [`ConversationMemory::load`] rebuilds it
//! from the loaded history. Saves go through a temp file and a rename so a
//! failed write never leaves a truncated snapshot behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ConversationMemory, DEFAULT_THREAD, HistoryEntry, ThreadIndex};
use crate::error::{LoadError, WriteError};

/// Owned, deserialized snapshot.
#[derive(Deserialize, Debug, Clone)]
pub struct Snapshot {
    pub history: Vec<HistoryEntry>,
    pub threads: ThreadIndex,
    #[serde(default = "default_thread")]
    pub current_thread: String,
}

/// Borrowed view used for serialization, so saving never clones history.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    history: &'a [HistoryEntry],
    threads: &'a ThreadIndex,
    current_thread: &'a str,
}

fn default_thread() -> String {
    DEFAULT_THREAD.to_string()
}

impl Snapshot {
    /// Read and parse a snapshot file without touching any memory.
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let json = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot = serde_json::from_str(&json).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Every thread index must point into the history.
    pub fn validate(&self) -> Result<(), LoadError> {
        let len = self.history.len();
        match self.threads.first_out_of_range(len) {
            Some((thread, index)) => Err(LoadError::DanglingIndex {
                thread: thread.to_string(),
                index,
                len,
            }),
            None => Ok(()),
        }
    }
}

impl ConversationMemory {
    /// Write history, threads and the current thread id to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WriteError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&SnapshotRef {
            history: self.history.entries(),
            threads: &self.threads,
            current_thread: &self.current_thread,
        })?;

        let tmp_path = temp_path_for(path);
        fs::write(&tmp_path, json).map_err(|source| WriteError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(WriteError::Io {
                path: path.to_path_buf(),
                source,
            });
        }

        info!(
            "Saved memory snapshot to {} ({} entries, {} threads)",
            path.display(),
            self.history.len(),
            self.threads.len()
        );
        Ok(())
    }

    /// Replace history and threads from a snapshot file and rebuild the
    /// keyword index. On error nothing is modified.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let snapshot = Snapshot::read(path)?;
        let (entries, threads) = (snapshot.history.len(), snapshot.threads.len());
        self.restore(snapshot);
        info!(
            "Loaded memory snapshot from {} ({entries} entries, {threads} threads)",
            path.display()
        );
        Ok(())
    }
}

/// Sibling temp file: `dir/.name.tmp`.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
