//! Audit event storage and retrieval.
//!
//! Events record every queue, conflict, and cursor mutation so a vault's
//! sync history can be inspected after the fact.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChangeQueued,
    ChangeAcknowledged,
    ChangeDropped,
    PushFailed,
    ChangeRebased,
    ConflictDetected,
    ConflictResolved,
    RemoteApplied,
    CursorAdvanced,
    SyncCompleted,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChangeQueued => "change_queued",
            Self::ChangeAcknowledged => "change_acknowledged",
            Self::ChangeDropped => "change_dropped",
            Self::PushFailed => "push_failed",
            Self::ChangeRebased => "change_rebased",
            Self::ConflictDetected => "conflict_detected",
            Self::ConflictResolved => "conflict_resolved",
            Self::RemoteApplied => "remote_applied",
            Self::CursorAdvanced => "cursor_advanced",
            Self::SyncCompleted => "sync_completed",
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub note_id: String,
    pub event_type: EventType,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(note_id: &str, event_type: EventType) -> Self {
        Self {
            id: 0,
            note_id: note_id.to_string(),
            event_type,
            detail: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a free-form detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_events (note_id, event_type, detail, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            event.note_id,
            event.event_type.as_str(),
            event.detail,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events, newest first, optionally for one note.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(conn: &Connection, note_id: Option<&str>, limit: Option<u32>) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, note_id, event_type, detail, created_at
         FROM sync_events
         WHERE ?1 IS NULL OR note_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![note_id, limit], |row| {
        Ok(Event {
            id: row.get(0)?,
            note_id: row.get(1)?,
            event_type: parse_event_type(row.get::<_, String>(2)?.as_str()),
            detail: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    rows.collect()
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "change_queued" => EventType::ChangeQueued,
        "change_acknowledged" => EventType::ChangeAcknowledged,
        "change_dropped" => EventType::ChangeDropped,
        "push_failed" => EventType::PushFailed,
        "change_rebased" => EventType::ChangeRebased,
        "conflict_detected" => EventType::ConflictDetected,
        "conflict_resolved" => EventType::ConflictResolved,
        "remote_applied" => EventType::RemoteApplied,
        "sync_completed" => EventType::SyncCompleted,
        _ => EventType::CursorAdvanced,
    }
}
