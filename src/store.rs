//! # Shared Context Store
//!
//! Per-session document context and conversation history. The gateway only
//! talks to the [`ContextStore`] trait; session isolation and persistence
//! format belong to whoever implements it.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

/// The document a session has selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub filename: String,
    pub content: String,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user: String,
    pub assistant: String,
    pub timestamp: String,
}

/// Storage consumed by the orchestrators. Every method is one short,
/// self-contained operation; implementations must never block for long.
pub trait ContextStore: Send + Sync {
    fn get_document(&self, session_id: &str) -> Option<DocumentContext>;

    fn put_document(&self, session_id: &str, document: DocumentContext);

    /// Full history, oldest first. Empty when the session has none.
    fn get_history(&self, session_id: &str) -> Vec<HistoryEntry>;

    /// The last `n` entries, oldest first.
    fn recent_history(&self, session_id: &str, n: usize) -> Vec<HistoryEntry> {
        let history = self.get_history(session_id);
        let skip = history.len().saturating_sub(n);
        history.into_iter().skip(skip).collect()
    }

    fn append_history(&self, session_id: &str, entry: HistoryEntry);

    fn clear_history(&self, session_id: &str);
}

#[derive(Debug, Default)]
struct Sessions {
    documents: HashMap<String, DocumentContext>,
    histories: HashMap<String, Vec<HistoryEntry>>,
}

/// # In-Memory Context Store
///
/// Both maps sit behind a single mutex. History grows without bound.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    sessions: Mutex<Sessions>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ContextStore for InMemoryContextStore {
    fn get_document(&self, session_id: &str) -> Option<DocumentContext> {
        self.lock().documents.get(session_id).cloned()
    }

    fn put_document(&self, session_id: &str, document: DocumentContext) {
        self.lock().documents.insert(session_id.to_string(), document);
    }

    fn get_history(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.lock().histories.get(session_id).cloned().unwrap_or_default()
    }

    // Copies only the tail instead of the whole history.
    fn recent_history(&self, session_id: &str, n: usize) -> Vec<HistoryEntry> {
        let sessions = self.lock();
        match sessions.histories.get(session_id) {
            Some(history) => history[history.len().saturating_sub(n)..].to_vec(),
            None => Vec::new(),
        }
    }

    fn append_history(&self, session_id: &str, entry: HistoryEntry) {
        self.lock()
            .histories
            .entry(session_id.to_string())
            .or_default()
            .push(entry);
    }

    fn clear_history(&self, session_id: &str) {
        if let Some(history) = self.lock().histories.get_mut(session_id) {
            history.clear();
        }
    }
}
