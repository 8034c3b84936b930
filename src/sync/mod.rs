//! Local-first synchronization.
//!
//! This module keeps a vault's notes consistent with a remote server:
//!
//! - **Engine**: push → pull cycles, background polling, public control surface
//! - **Network**: online/offline signal with change listeners
//! - **Conflicts**: divergence detection, recency auto-resolution, manual resolution
//! - **Transport**: the server boundary, with an HTTP implementation
//! - **Host**: the note-store capability the engine writes through
//!
//! # Example
//!
//! ```ignore
//! use notesync::sync::{EngineOptions, HttpTransport, MemoryNoteStore, NetworkMonitor, SyncEngine};
//!
//! let engine = Arc::new(SyncEngine::new(options, transport, MemoryNoteStore::new())?);
//! engine.initialize()?;
//!
//! engine.queue_change(&note, ChangeOperation::Update)?;
//! let report = engine.trigger_sync().await;
//! println!("pushed {} pulled {}", report.pushed, report.pulled);
//!
//! engine.shutdown().await;
//! ```

mod backoff;
mod conflict;
mod engine;
mod hash;
mod host;
mod network;
mod status;
mod transport;
mod types;

pub use backoff::{calculate_backoff, Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use conflict::{ConflictResolver, CONFLICT_COPY_MARKER, DEFAULT_AUTO_RESOLVE_THRESHOLD_MS};
pub use engine::{EngineOptions, SyncEngine};
pub use hash::{content_hash, has_changed};
pub use host::{FileNoteStore, MemoryNoteStore, NoteStore};
pub use network::NetworkMonitor;
pub use status::{print_conflicts, print_events, print_pending, print_status};
pub use transport::{
    AcceptedChange, ConflictedChange, HttpTransport, PullRequest, PullResponse, PushRequest,
    PushResponse, RejectedChange, ServerChange, ServerStatus, SyncTransport,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{SyncReport, SyncState, SyncStatus};
