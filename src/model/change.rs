//! Pending changes and conflicts.
//!
//! A pending change is a local edit the server has not confirmed yet.
//! A conflict is a divergence between a local and a remote copy of the same
//! note that version ordering alone could not settle.

use serde::{Deserialize, Serialize};

use super::Note;
use crate::error::{Error, Result};

/// Kind of local mutation queued for push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for anything other than create/update/delete.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidArgument(format!("unknown operation '{other}'"))),
        }
    }

    /// Operation to keep when `next` is queued on top of `self`.
    ///
    /// A create the server never saw stays a create; anything else is replaced.
    #[must_use]
    pub const fn coalesce(self, next: Self) -> Self {
        match (self, next) {
            (Self::Create, Self::Update) => Self::Create,
            (_, next) => next,
        }
    }
}

/// A local change waiting for server acknowledgement.
///
/// At most one exists per note; queuing another replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Identity of this particular queued edit
    pub change_id: String,

    /// Note the change applies to
    pub note_id: String,

    /// What to do with the note on the server
    pub operation: ChangeOperation,

    /// Snapshot of the note (absent for deletes)
    pub payload: Option<Note>,

    /// Server version the local copy was based on when queued
    pub version_at_queue_time: i64,

    /// Queue timestamp (Unix milliseconds)
    pub queued_at: i64,

    /// Failed push attempts so far
    #[serde(default)]
    pub attempts: u32,

    /// Last per-item error reported by the server or transport
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingChange {
    /// Build a change for `note`. Deletes carry no payload.
    #[must_use]
    pub fn new(note: &Note, operation: ChangeOperation) -> Self {
        let payload = match operation {
            ChangeOperation::Delete => None,
            ChangeOperation::Create | ChangeOperation::Update => Some(note.clone()),
        };

        Self {
            change_id: uuid::Uuid::new_v4().to_string(),
            note_id: note.id.clone(),
            operation,
            payload,
            version_at_queue_time: note.version(),
            queued_at: chrono::Utc::now().timestamp_millis(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Build a delete for a note that may no longer exist locally.
    #[must_use]
    pub fn deletion(note_id: &str, base_version: i64) -> Self {
        Self {
            change_id: uuid::Uuid::new_v4().to_string(),
            note_id: note_id.to_string(),
            operation: ChangeOperation::Delete,
            payload: None,
            version_at_queue_time: base_version,
            queued_at: chrono::Utc::now().timestamp_millis(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// How a conflict arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Both sides edited the note.
    Edit,
    /// One side deleted the note while the other edited it.
    DeleteEdit,
}

impl ConflictType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::DeleteEdit => "delete-edit",
        }
    }

    /// Parse from storage. Unknown values fall back to `Edit`.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "delete-edit" => Self::DeleteEdit,
            _ => Self::Edit,
        }
    }
}

/// An unresolved divergence for one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Note in conflict (unique key)
    pub note_id: String,

    /// Local copy; `None` when the local side is a deletion
    pub local_note: Option<Note>,

    /// Remote copy; `None` when the remote side is a deletion
    pub remote_note: Option<Note>,

    /// Server version the local copy was based on
    pub local_version: i64,

    /// Version the server currently holds
    pub remote_version: i64,

    /// Detection timestamp (Unix milliseconds)
    pub detected_at: i64,

    /// Edit/edit or delete/edit
    pub conflict_type: ConflictType,
}

/// Choice applied to a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepLocal,
    KeepRemote,
    KeepBoth,
}

impl Resolution {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepRemote => "keep_remote",
            Self::KeepBoth => "keep_both",
        }
    }

    /// Parse `keep_local`, `keep-local`, or the short `local`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "keep_local" | "local" => Ok(Self::KeepLocal),
            "keep_remote" | "remote" => Ok(Self::KeepRemote),
            "keep_both" | "both" => Ok(Self::KeepBoth),
            other => Err(Error::InvalidArgument(format!("unknown resolution '{other}'"))),
        }
    }
}

/// Result of resolving a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// The choice that was applied
    pub resolution: Resolution,

    /// Canonical note after resolution; `None` when the note ends up deleted
    pub resolved_note: Option<Note>,

    /// Fresh, never-synced copy of the local note (`keep_both` only)
    pub copy_note: Option<Note>,
}

/// Result of an automatic, recency-based resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoResolution {
    /// `KeepLocal` or `KeepRemote`
    pub resolution: Resolution,

    /// The newer of the two notes
    pub resolved_note: Note,
}
