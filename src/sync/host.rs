//! Host note-store capability.
//!
//! The engine never touches notes directly. It reads, saves, and deletes
//! them through a [`NoteStore`] injected at construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::model::Note;

/// Trait for the host's durable note store.
pub trait NoteStore: Send + Sync {
    /// Persist a note created or updated by sync.
    fn save_note(&self, note: Note) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete a note removed remotely. Deleting a missing note succeeds.
    fn delete_note(&self, note_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Current local state of a note.
    fn read_note(&self, note_id: &str) -> impl std::future::Future<Output = Result<Option<Note>>> + Send;
}

/// In-memory note store.
///
/// Clones share the same map, so a test can keep a handle while the engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryNoteStore {
    notes: Arc<Mutex<HashMap<String, Note>>>,
}

impl MemoryNoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a note without going through the engine.
    pub fn insert(&self, note: Note) {
        self.lock().insert(note.id.clone(), note);
    }

    #[must_use]
    pub fn get(&self, note_id: &str) -> Option<Note> {
        self.lock().get(note_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All notes, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.lock().values().cloned().collect();
        notes.sort_by(|a, b| a.id.cmp(&b.id));
        notes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Note>> {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NoteStore for MemoryNoteStore {
    async fn save_note(&self, note: Note) -> Result<()> {
        self.insert(note);
        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.lock().remove(note_id);
        Ok(())
    }

    async fn read_note(&self, note_id: &str) -> Result<Option<Note>> {
        Ok(self.get(note_id))
    }
}

/// One JSON file per note under a directory.
#[derive(Debug, Clone)]
pub struct FileNoteStore {
    root: PathBuf,
}

impl FileNoteStore {
    /// Store notes under `root` (created on first save).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Notes directory inside a vault.
    #[must_use]
    pub fn for_vault(vault: &Path) -> Self {
        Self::new(vault.join("notes"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn note_path(&self, note_id: &str) -> Result<PathBuf> {
        if note_id.is_empty()
            || note_id.contains(['/', '\\'])
            || note_id == "."
            || note_id == ".."
        {
            return Err(Error::InvalidArgument(format!("invalid note id '{note_id}'")));
        }
        Ok(self.root.join(format!("{note_id}.json")))
    }
}

impl NoteStore for FileNoteStore {
    async fn save_note(&self, note: Note) -> Result<()> {
        let path = self.note_path(&note.id)?;
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&note)?;

        tokio::fs::create_dir_all(&self.root).await?;

        // Write to temp file, sync, then rename into place
        {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        let path = self.note_path(note_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Host(format!("Failed to delete {}: {e}", path.display()))),
        }
    }

    async fn read_note(&self, note_id: &str) -> Result<Option<Note>> {
        let path = self.note_path(note_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Host(format!("Failed to read {}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileNoteStore::for_vault(temp_dir.path());

        let note = Note::new("n1", "Trip", json!({ "text": "pack" })).with_version(2);
        store.save_note(note.clone()).await.unwrap();

        assert!(temp_dir.path().join("notes").join("n1.json").exists());
        assert_eq!(store.read_note("n1").await.unwrap(), Some(note));

        store.delete_note("n1").await.unwrap();
        assert_eq!(store.read_note("n1").await.unwrap(), None);
        // deleting again is fine
        store.delete_note("n1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileNoteStore::for_vault(temp_dir.path());

        let err = store.read_note("../escape").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_memory_store_shares_state() {
        let store = MemoryNoteStore::new();
        let handle = store.clone();

        store
            .save_note(Note::new("a", "A", json!(null)))
            .await
            .unwrap();
        assert_eq!(handle.len(), 1);

        handle.delete_note("a").await.unwrap();
        assert!(store.is_empty());
    }
}
