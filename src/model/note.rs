//! Note model as seen by the sync engine.
//!
//! Notes are owned by the host's note store. The engine only reads and
//! writes them through the [`NoteStore`](crate::sync::NoteStore) callbacks,
//! and only interprets the optional sync envelope.

use serde::{Deserialize, Serialize};

use crate::sync::content_hash;

/// Sync metadata a note carries once the server has accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// Server-assigned version, monotonically increasing per note.
    pub version: i64,

    /// SHA-256 of the note content at that version.
    pub content_hash: String,
}

/// A note in the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: String,

    /// Note title
    pub title: String,

    /// Structured document body (opaque to the engine)
    #[serde(default)]
    pub content: serde_json::Value,

    /// Tags attached to the note
    #[serde(default)]
    pub tags: Vec<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,

    /// Sync envelope; `None` means the note has never been synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncEnvelope>,
}

impl Note {
    /// Create a never-synced note stamped with the current time.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: serde_json::Value) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            title: title.into(),
            content,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            sync: None,
        }
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Set the update timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Attach a sync envelope.
    #[must_use]
    pub fn with_version(mut self, version: i64) -> Self {
        let hash = self.content_hash();
        self.sync = Some(SyncEnvelope {
            version,
            content_hash: hash,
        });
        self
    }

    /// Last server version this copy is based on (0 if never synced).
    #[must_use]
    pub fn version(&self) -> i64 {
        self.sync.as_ref().map_or(0, |s| s.version)
    }

    /// Whether the note has been accepted by the server at least once.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync.is_some()
    }

    /// Hash of the current content.
    #[must_use]
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_note_is_unsynced() {
        let note = Note::new("n1", "Groceries", json!({"text": "milk"}));
        assert!(!note.is_synced());
        assert_eq!(note.version(), 0);
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_with_version_stamps_hash() {
        let note = Note::new("n1", "Groceries", json!({"text": "milk"})).with_version(4);
        let envelope = note.sync.as_ref().unwrap();
        assert_eq!(envelope.version, 4);
        assert_eq!(envelope.content_hash, note.content_hash());
    }

    #[test]
    fn test_envelope_omitted_when_unsynced() {
        let note = Note::new("n1", "t", json!("body"));
        let text = serde_json::to_string(&note).unwrap();
        assert!(!text.contains("\"sync\""));

        let parsed: Note = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, note);
    }
}
