//! File-backed conversation history persistence.
//!
//! Mirrors a small key-value store: the whole ordered history lives as one
//! JSON document under a fixed key inside the store file. Corrupt or
//! unreadable state is never fatal; it is logged and replaced by a fresh
//! history containing only the welcome message.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::conversation::{Message, Sender};

/// Key under which the conversation history is stored.
const HISTORY_KEY: &str = "tutor-chat-history";

/// First model message of every fresh conversation.
pub const WELCOME_MESSAGE: &str =
    "Hi! I'm your tutor. What would you like to learn about today?";

/// Errors from reading or writing the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The store file could not be read or written
    #[error("History store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The history could not be serialized
    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Persists the ordered message history as JSON on disk.
///
/// Loading is lenient: a missing, corrupt, or structurally invalid file
/// yields the default single-welcome-message history rather than an error.
/// Saving is strict and surfaces I/O and serialization failures.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The history a brand-new conversation starts with.
    pub fn default_history() -> Vec<Message> {
        vec![Message::new(Sender::Model, WELCOME_MESSAGE, None)]
    }

    /// Load the stored history, falling back to the default on any problem.
    pub fn load(&self) -> Vec<Message> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no stored history");
                return Self::default_history();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "history unreadable: {}", e);
                return Self::default_history();
            }
        };

        match serde_json::from_str::<HashMap<String, Vec<Message>>>(&raw) {
            Ok(mut document) => match document.remove(HISTORY_KEY) {
                Some(history) if !history.is_empty() => history,
                _ => {
                    tracing::debug!(key = HISTORY_KEY, "stored history missing or empty");
                    Self::default_history()
                }
            },
            Err(e) => {
                tracing::warn!(key = HISTORY_KEY, "discarding corrupt history: {}", e);
                Self::default_history()
            }
        }
    }

    /// Persist the full history, replacing whatever was stored.
    pub fn save(&self, history: &[Message]) -> HistoryResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let document = HashMap::from([(HISTORY_KEY, history)]);
        fs::write(&self.path, serde_json::to_vec(&document)?)?;
        tracing::debug!(count = history.len(), "history saved");
        Ok(())
    }
}
