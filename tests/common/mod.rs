//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notesync::config::SyncConfig;
use notesync::error::{Error, Result};
use notesync::model::Note;
use notesync::storage::SyncDatabase;
use notesync::sync::{
    AcceptedChange, ConflictedChange, EngineOptions, MemoryNoteStore, NetworkMonitor, NoteStore,
    PullRequest, PullResponse, PushRequest, PushResponse, RejectedChange, ServerStatus,
    SyncEngine, SyncTransport, CONFLICT_COPY_MARKER,
};

/// Server verdict for one note on push.
#[derive(Debug, Clone)]
pub enum Verdict {
    Reject(String),
    Conflict { server_version: i64, server_note: Option<Note> },
}

#[derive(Default)]
struct Script {
    push_calls: Vec<PushRequest>,
    pull_calls: Vec<PullRequest>,
    push_failures_remaining: u32,
    push_delay: Option<Duration>,
    verdicts: HashMap<String, Verdict>,
    pull_pages: VecDeque<std::result::Result<PullResponse, String>>,
    next_sequence: i64,
}

/// In-process server whose answers are set up by each test.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` pushes with a transport error.
    pub fn fail_pushes(&self, n: u32) {
        self.script.lock().unwrap().push_failures_remaining = n;
    }

    /// Make every push take at least `delay`.
    pub fn delay_pushes(&self, delay: Duration) {
        self.script.lock().unwrap().push_delay = Some(delay);
    }

    pub fn set_verdict(&self, note_id: &str, verdict: Verdict) {
        self.script
            .lock()
            .unwrap()
            .verdicts
            .insert(note_id.to_string(), verdict);
    }

    pub fn clear_verdict(&self, note_id: &str) {
        self.script.lock().unwrap().verdicts.remove(note_id);
    }

    /// Queue a pull page.
    pub fn add_page(&self, page: PullResponse) {
        self.script.lock().unwrap().pull_pages.push_back(Ok(page));
    }

    /// Queue a failing pull.
    pub fn add_failing_page(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .pull_pages
            .push_back(Err(message.to_string()));
    }

    pub fn push_calls(&self) -> usize {
        self.script.lock().unwrap().push_calls.len()
    }

    pub fn pull_calls(&self) -> usize {
        self.script.lock().unwrap().pull_calls.len()
    }

    pub fn pushed_batches(&self) -> Vec<PushRequest> {
        self.script.lock().unwrap().push_calls.clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.script.lock().unwrap().pull_calls.clone()
    }
}

impl SyncTransport for ScriptedTransport {
    async fn push(&self, request: PushRequest) -> Result<PushResponse> {
        let delay = {
            let mut script = self.script.lock().unwrap();
            script.push_calls.push(request.clone());
            script.push_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        if script.push_failures_remaining > 0 {
            script.push_failures_remaining -= 1;
            return Err(Error::Transport("connection reset by peer".into()));
        }

        let mut response = PushResponse::default();
        for change in &request.changes {
            match script.verdicts.get(&change.note_id).cloned() {
                Some(Verdict::Reject(error)) => response.errors.push(RejectedChange {
                    note_id: change.note_id.clone(),
                    error,
                    retryable: true,
                }),
                Some(Verdict::Conflict {
                    server_version,
                    server_note,
                }) => response.conflicts.push(ConflictedChange {
                    note_id: change.note_id.clone(),
                    server_version,
                    server_note,
                }),
                None => {
                    script.next_sequence += 1;
                    response.accepted.push(AcceptedChange {
                        note_id: change.note_id.clone(),
                        server_version: change.version_at_queue_time + 1,
                        server_sequence: script.next_sequence,
                    });
                }
            }
        }
        Ok(response)
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        let mut script = self.script.lock().unwrap();
        script.pull_calls.push(request.clone());

        match script.pull_pages.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Ok(PullResponse {
                changes: Vec::new(),
                has_more: false,
                latest_sequence: request.since_sequence,
                server_time: chrono::Utc::now().timestamp_millis(),
            }),
        }
    }

    async fn check_status(&self) -> Result<ServerStatus> {
        Ok(ServerStatus {
            ok: true,
            server_time: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// Note store whose disk fills up when asked to save a conflicted copy.
#[derive(Clone, Default)]
pub struct CopyRejectingStore {
    pub notes: MemoryNoteStore,
    reject_copies: Arc<AtomicBool>,
}

impl CopyRejectingStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.reject_copies.store(true, Ordering::SeqCst);
        store
    }

    pub fn accept_copies(&self) {
        self.reject_copies.store(false, Ordering::SeqCst);
    }
}

impl NoteStore for CopyRejectingStore {
    async fn save_note(&self, note: Note) -> Result<()> {
        if self.reject_copies.load(Ordering::SeqCst) && note.title.ends_with(CONFLICT_COPY_MARKER) {
            return Err(Error::Host("disk full".into()));
        }
        self.notes.save_note(note).await
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.notes.delete_note(note_id).await
    }

    async fn read_note(&self, note_id: &str) -> Result<Option<Note>> {
        self.notes.read_note(note_id).await
    }
}

pub type TestEngine = SyncEngine<ScriptedTransport, MemoryNoteStore>;

pub fn test_config(enabled: bool) -> SyncConfig {
    SyncConfig {
        enabled,
        server_url: Some("https://sync.test".into()),
        device_id: Some("test-device".into()),
        last_sync_sequence: 0,
        sync_interval_ms: 60_000,
    }
}

pub fn options(vault: PathBuf, config: SyncConfig, monitor: &NetworkMonitor) -> EngineOptions {
    EngineOptions {
        vault_path: vault,
        config,
        network_monitor: monitor.clone(),
        api_key: Some("test-key".into()),
    }
}

/// Engine over an in-memory database.
pub fn memory_engine(
    transport: &ScriptedTransport,
    store: &MemoryNoteStore,
    monitor: &NetworkMonitor,
) -> Arc<TestEngine> {
    let db = SyncDatabase::open_memory().unwrap();
    Arc::new(SyncEngine::with_database(
        options(PathBuf::from("memory-vault"), test_config(true), monitor),
        db,
        transport.clone(),
        store.clone(),
    ))
}

/// A note the server has accepted at `version`.
pub fn synced_note(id: &str, text: &str, version: i64) -> Note {
    Note::new(id, format!("Note {id}"), serde_json::json!({ "text": text })).with_version(version)
}

/// A note never seen by the server.
pub fn fresh_note(id: &str, text: &str) -> Note {
    Note::new(id, format!("Note {id}"), serde_json::json!({ "text": text }))
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
