//! Progress observability for generation runs.
//!
//! The pipeline appends human-readable [`UpdateEntry`] lines while it works. Entries
//! are for display only and never drive control flow.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub text: String,
}

impl UpdateEntry {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            text: text.into(),
        }
    }
}

/// Fire-and-forget receiver of progress entries. Must accept concurrent appends.
pub trait UpdateSink: Send + Sync {
    fn append(&self, entry: UpdateEntry);

    fn note(&self, text: &str) {
        self.append(UpdateEntry::now(text));
    }
}

/// Shared in-memory update log. Clones append to the same list.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    entries: Arc<Mutex<Vec<UpdateEntry>>>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<UpdateEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl UpdateSink for UpdateLog {
    fn append(&self, entry: UpdateEntry) {
        info!(target: "cardwright::progress", "{}", entry.text);
        self.entries.lock().push(entry);
    }
}
