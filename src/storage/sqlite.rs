//! SQLite storage implementation.
//!
//! This module provides the durable sync database for a vault. Every
//! operation is synchronous and local. Multi-statement writes follow the
//! `mutate` pattern: one IMMEDIATE transaction that also records audit events.

use crate::error::{Error, Result};
use crate::model::{ChangeOperation, ConflictType, Note, PendingChange, SyncConflict};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

const CURSOR_KEY: &str = "cursor";
const LAST_SYNC_KEY: &str = "last_sync_at";

/// SQLite-based sync database for one vault.
///
/// Must be owned by exactly one engine; two engines must never share a file.
#[derive(Debug)]
pub struct SyncDatabase {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, note_id: &str, event_type: EventType) {
        self.events.push(Event::new(note_id, event_type));
    }

    /// Record an event with a detail string.
    pub fn record_detail(&mut self, note_id: &str, event_type: EventType, detail: impl Into<String>) {
        self.events
            .push(Event::new(note_id, event_type).with_detail(detail));
    }
}

impl SyncDatabase {
    /// Open a database at the given path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, writes the audit
    /// events it recorded, and commits. Any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ======================
    // Pending Change Queue
    // ======================

    /// Upsert a pending change by note id, replacing any existing one.
    ///
    /// A queued `create` followed by an `update` keeps the `create`
    /// operation with the newer payload. Returns the change as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn enqueue(&mut self, change: &PendingChange) -> Result<PendingChange> {
        self.mutate("enqueue", |tx, ctx| {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT operation FROM pending_changes WHERE note_id = ?1",
                    [&change.note_id],
                    |row| row.get(0),
                )
                .optional()?;

            let operation = match existing {
                Some(op) => ChangeOperation::parse(&op)?.coalesce(change.operation),
                None => change.operation,
            };

            let payload = change
                .payload
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            tx.execute(
                "INSERT INTO pending_changes
                   (note_id, change_id, operation, payload, version_at_queue_time, queued_at, attempts, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL)
                 ON CONFLICT(note_id) DO UPDATE SET
                   change_id = excluded.change_id,
                   operation = excluded.operation,
                   payload = excluded.payload,
                   version_at_queue_time = excluded.version_at_queue_time,
                   queued_at = excluded.queued_at,
                   attempts = 0,
                   last_error = NULL",
                rusqlite::params![
                    change.note_id,
                    change.change_id,
                    operation.as_str(),
                    payload,
                    change.version_at_queue_time,
                    change.queued_at,
                ],
            )?;

            ctx.record_detail(&change.note_id, EventType::ChangeQueued, operation.as_str());

            Ok(PendingChange {
                operation,
                attempts: 0,
                last_error: None,
                ..change.clone()
            })
        })
    }

    /// Remove the pending change for a note, whatever it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn dequeue(&mut self, note_id: &str) -> Result<bool> {
        self.mutate("dequeue", |tx, ctx| {
            let rows = tx.execute("DELETE FROM pending_changes WHERE note_id = ?1", [note_id])?;
            if rows > 0 {
                ctx.record_event(note_id, EventType::ChangeDropped);
            }
            Ok(rows > 0)
        })
    }

    /// Remove a pending change only if it is still the one identified by
    /// `change_id`. A newer edit queued meanwhile is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn dequeue_change(&mut self, note_id: &str, change_id: &str) -> Result<bool> {
        self.mutate("dequeue_change", |tx, ctx| {
            let rows = tx.execute(
                "DELETE FROM pending_changes WHERE note_id = ?1 AND change_id = ?2",
                [note_id, change_id],
            )?;
            if rows > 0 {
                ctx.record_event(note_id, EventType::ChangeAcknowledged);
            }
            Ok(rows > 0)
        })
    }

    /// Get the pending change for a note.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_pending(&self, note_id: &str) -> Result<Option<PendingChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT change_id, note_id, operation, payload, version_at_queue_time, queued_at, attempts, last_error
             FROM pending_changes WHERE note_id = ?1",
        )?;
        let change = stmt.query_row([note_id], map_pending_row).optional()?;
        Ok(change)
    }

    /// List pending changes in queue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_pending(&self) -> Result<Vec<PendingChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT change_id, note_id, operation, payload, version_at_queue_time, queued_at, attempts, last_error
             FROM pending_changes ORDER BY queued_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], map_pending_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Count pending changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_pending(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_changes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Record a failed push attempt for a still-current pending change.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn record_push_failure(&mut self, note_id: &str, change_id: &str, error: &str) -> Result<()> {
        self.mutate("record_push_failure", |tx, ctx| {
            let rows = tx.execute(
                "UPDATE pending_changes SET attempts = attempts + 1, last_error = ?3
                 WHERE note_id = ?1 AND change_id = ?2",
                rusqlite::params![note_id, change_id, error],
            )?;
            if rows > 0 {
                ctx.record_detail(note_id, EventType::PushFailed, error);
            }
            Ok(())
        })
    }

    /// Move a pending change's base version forward.
    ///
    /// Used when the server accepted an earlier edit of the same note while
    /// a newer one was queued, so the newer one does not conflict with it.
    /// The server now has the note, so a queued `create` becomes an `update`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn rebase_pending(&mut self, note_id: &str, version: i64) -> Result<bool> {
        self.mutate("rebase_pending", |tx, ctx| {
            let rows = tx.execute(
                "UPDATE pending_changes
                 SET version_at_queue_time = MAX(version_at_queue_time, ?2),
                     operation = CASE operation WHEN 'create' THEN 'update' ELSE operation END
                 WHERE note_id = ?1 AND (version_at_queue_time < ?2 OR operation = 'create')",
                rusqlite::params![note_id, version],
            )?;
            if rows > 0 {
                ctx.record_detail(note_id, EventType::ChangeRebased, format!("v{version}"));
            }
            Ok(rows > 0)
        })
    }

    // ==========
    // Conflicts
    // ==========

    /// Store a conflict, replacing any existing one for the same note.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn store_conflict(&mut self, conflict: &SyncConflict) -> Result<()> {
        let local = conflict
            .local_note
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let remote = conflict
            .remote_note
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.mutate("store_conflict", |tx, ctx| {
            tx.execute(
                "INSERT INTO sync_conflicts
                   (note_id, local_note, remote_note, local_version, remote_version, conflict_type, detected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(note_id) DO UPDATE SET
                   local_note = excluded.local_note,
                   remote_note = excluded.remote_note,
                   local_version = excluded.local_version,
                   remote_version = excluded.remote_version,
                   conflict_type = excluded.conflict_type,
                   detected_at = excluded.detected_at",
                rusqlite::params![
                    conflict.note_id,
                    local,
                    remote,
                    conflict.local_version,
                    conflict.remote_version,
                    conflict.conflict_type.as_str(),
                    conflict.detected_at,
                ],
            )?;
            ctx.record_detail(
                &conflict.note_id,
                EventType::ConflictDetected,
                format!(
                    "{} local v{} remote v{}",
                    conflict.conflict_type.as_str(),
                    conflict.local_version,
                    conflict.remote_version
                ),
            );
            Ok(())
        })
    }

    /// Get the conflict recorded for a note.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_conflict(&self, note_id: &str) -> Result<Option<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT note_id, local_note, remote_note, local_version, remote_version, conflict_type, detected_at
             FROM sync_conflicts WHERE note_id = ?1",
        )?;
        let conflict = stmt.query_row([note_id], map_conflict_row).optional()?;
        Ok(conflict)
    }

    /// List all unresolved conflicts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_conflicts(&self) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT note_id, local_note, remote_note, local_version, remote_version, conflict_type, detected_at
             FROM sync_conflicts ORDER BY detected_at ASC, note_id ASC",
        )?;
        let rows = stmt.query_map([], map_conflict_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Remove the conflict for a note.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_conflict(&mut self, note_id: &str, detail: &str) -> Result<bool> {
        self.mutate("remove_conflict", |tx, ctx| {
            let rows = tx.execute("DELETE FROM sync_conflicts WHERE note_id = ?1", [note_id])?;
            if rows > 0 {
                ctx.record_detail(note_id, EventType::ConflictResolved, detail);
            }
            Ok(rows > 0)
        })
    }

    /// Count unresolved conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_conflict_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_conflicts", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ============
    // Sync State
    // ============

    /// Get the highest server sequence applied so far, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored value is corrupt.
    pub fn get_cursor(&self) -> Result<Option<i64>> {
        self.get_state_i64(CURSOR_KEY)
    }

    /// Persist the pull cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_cursor(&mut self, sequence: i64) -> Result<()> {
        self.mutate("set_cursor", |tx, ctx| {
            set_state(tx, CURSOR_KEY, &sequence.to_string())?;
            ctx.record_detail("*", EventType::CursorAdvanced, sequence.to_string());
            Ok(())
        })
    }

    /// Get the completion time of the last successful cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored value is corrupt.
    pub fn get_last_sync_at(&self) -> Result<Option<i64>> {
        self.get_state_i64(LAST_SYNC_KEY)
    }

    /// Persist the completion time of a successful cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_last_sync_at(&mut self, timestamp: i64) -> Result<()> {
        self.mutate("set_last_sync_at", |tx, ctx| {
            set_state(tx, LAST_SYNC_KEY, &timestamp.to_string())?;
            ctx.record_event("*", EventType::SyncCompleted);
            Ok(())
        })
    }

    fn get_state_i64(&self, key: &str) -> Result<Option<i64>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM sync_state WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;

        value
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|e| Error::Other(format!("Corrupt sync_state '{key}': {e}")))
            })
            .transpose()
    }

    /// Record that a pulled change was applied to the note store.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_remote_applied(&mut self, note_id: &str, detail: &str) -> Result<()> {
        insert_event(
            &self.conn,
            &Event::new(note_id, EventType::RemoteApplied).with_detail(detail),
        )?;
        Ok(())
    }

    /// Recent audit events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, note_id: Option<&str>, limit: u32) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, note_id, Some(limit))?)
    }
}

fn set_state(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, value, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

/// Decode an optional JSON note column.
fn note_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Note>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn map_pending_row(row: &rusqlite::Row) -> rusqlite::Result<PendingChange> {
    let operation: String = row.get(2)?;
    let operation = ChangeOperation::parse(&operation)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(PendingChange {
        change_id: row.get(0)?,
        note_id: row.get(1)?,
        operation,
        payload: note_column(row, 3)?,
        version_at_queue_time: row.get(4)?,
        queued_at: row.get(5)?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
    })
}

fn map_conflict_row(row: &rusqlite::Row) -> rusqlite::Result<SyncConflict> {
    Ok(SyncConflict {
        note_id: row.get(0)?,
        local_note: note_column(row, 1)?,
        remote_note: note_column(row, 2)?,
        local_version: row.get(3)?,
        remote_version: row.get(4)?,
        conflict_type: ConflictType::from_str(row.get::<_, String>(5)?.as_str()),
        detected_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn note(id: &str, text: &str) -> Note {
        Note::new(id, format!("Title {id}"), json!({ "text": text }))
    }

    fn conflict(note_id: &str) -> SyncConflict {
        SyncConflict {
            note_id: note_id.to_string(),
            local_note: Some(note(note_id, "local")),
            remote_note: Some(note(note_id, "remote").with_version(3)),
            local_version: 1,
            remote_version: 3,
            detected_at: chrono::Utc::now().timestamp_millis(),
            conflict_type: ConflictType::Edit,
        }
    }

    #[test]
    fn test_open_memory() {
        let db = SyncDatabase::open_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_enqueue_and_list() {
        let mut db = SyncDatabase::open_memory().unwrap();

        db.enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Create))
            .unwrap();
        db.enqueue(&PendingChange::new(&note("b", "1"), ChangeOperation::Update))
            .unwrap();

        let pending = db.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].note_id, "a");
        assert_eq!(pending[1].note_id, "b");
        assert_eq!(db.count_pending().unwrap(), 2);
    }

    #[test]
    fn test_enqueue_replaces_existing() {
        let mut db = SyncDatabase::open_memory().unwrap();

        for text in ["one", "two", "three"] {
            db.enqueue(&PendingChange::new(&note("a", text), ChangeOperation::Update))
                .unwrap();
        }

        let pending = db.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        let payload = pending[0].payload.as_ref().unwrap();
        assert_eq!(payload.content, json!({ "text": "three" }));
    }

    #[test]
    fn test_enqueue_keeps_create_over_update() {
        let mut db = SyncDatabase::open_memory().unwrap();

        db.enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Create))
            .unwrap();
        let stored = db
            .enqueue(&PendingChange::new(&note("a", "2"), ChangeOperation::Update))
            .unwrap();

        assert_eq!(stored.operation, ChangeOperation::Create);
        let pending = db.get_pending("a").unwrap().unwrap();
        assert_eq!(pending.operation, ChangeOperation::Create);
        assert_eq!(pending.payload.unwrap().content, json!({ "text": "2" }));
    }

    #[test]
    fn test_dequeue_change_ignores_newer_edit() {
        let mut db = SyncDatabase::open_memory().unwrap();

        let first = db
            .enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Update))
            .unwrap();
        let second = db
            .enqueue(&PendingChange::new(&note("a", "2"), ChangeOperation::Update))
            .unwrap();

        assert!(!db.dequeue_change("a", &first.change_id).unwrap());
        assert_eq!(db.count_pending().unwrap(), 1);
        assert!(db.dequeue_change("a", &second.change_id).unwrap());
        assert_eq!(db.count_pending().unwrap(), 0);
    }

    #[test]
    fn test_push_failure_bookkeeping() {
        let mut db = SyncDatabase::open_memory().unwrap();
        let change = db
            .enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Update))
            .unwrap();

        db.record_push_failure("a", &change.change_id, "quota exceeded")
            .unwrap();
        db.record_push_failure("a", &change.change_id, "quota exceeded")
            .unwrap();

        let pending = db.get_pending("a").unwrap().unwrap();
        assert_eq!(pending.attempts, 2);
        assert_eq!(pending.last_error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_rebase_only_moves_forward() {
        let mut db = SyncDatabase::open_memory().unwrap();
        db.enqueue(&PendingChange::new(
            &note("a", "1").with_version(2),
            ChangeOperation::Update,
        ))
        .unwrap();

        assert!(db.rebase_pending("a", 5).unwrap());
        assert!(!db.rebase_pending("a", 4).unwrap());
        assert_eq!(db.get_pending("a").unwrap().unwrap().version_at_queue_time, 5);
    }

    #[test]
    fn test_rebase_turns_create_into_update() {
        let mut db = SyncDatabase::open_memory().unwrap();
        db.enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Create))
            .unwrap();
        db.enqueue(&PendingChange::new(&note("a", "2"), ChangeOperation::Update))
            .unwrap();
        assert_eq!(db.get_pending("a").unwrap().unwrap().operation, ChangeOperation::Create);

        assert!(db.rebase_pending("a", 1).unwrap());

        let pending = db.get_pending("a").unwrap().unwrap();
        assert_eq!(pending.operation, ChangeOperation::Update);
        assert_eq!(pending.version_at_queue_time, 1);
        assert_eq!(pending.payload.unwrap().content, json!({ "text": "2" }));

        let events = db.recent_events(Some("a"), 10).unwrap();
        assert_eq!(events[0].event_type, EventType::ChangeRebased);
        assert_eq!(events[0].detail.as_deref(), Some("v1"));
    }

    #[test]
    fn test_last_sync_at_is_audited() {
        let mut db = SyncDatabase::open_memory().unwrap();
        db.set_last_sync_at(1_700_000_000_000).unwrap();

        assert_eq!(db.get_last_sync_at().unwrap(), Some(1_700_000_000_000));
        let events = db.recent_events(Some("*"), 10).unwrap();
        assert_eq!(events[0].event_type, EventType::SyncCompleted);
    }

    #[test]
    fn test_conflict_crud() {
        let mut db = SyncDatabase::open_memory().unwrap();

        db.store_conflict(&conflict("a")).unwrap();
        db.store_conflict(&conflict("a")).unwrap();
        db.store_conflict(&conflict("b")).unwrap();

        assert_eq!(db.get_conflict_count().unwrap(), 2);
        let stored = db.get_conflict("a").unwrap().unwrap();
        assert_eq!(stored.remote_version, 3);
        assert_eq!(stored.remote_note.unwrap().version(), 3);

        assert!(db.remove_conflict("a", "keep_local").unwrap());
        assert!(!db.remove_conflict("a", "keep_local").unwrap());
        assert!(db.get_conflict("a").unwrap().is_none());
        assert_eq!(db.list_conflicts().unwrap().len(), 1);
    }

    #[test]
    fn test_cursor_roundtrip() {
        let mut db = SyncDatabase::open_memory().unwrap();
        assert_eq!(db.get_cursor().unwrap(), None);

        db.set_cursor(42).unwrap();
        db.set_cursor(57).unwrap();
        assert_eq!(db.get_cursor().unwrap(), Some(57));
    }

    #[test]
    fn test_queue_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("sync.db");

        {
            let mut db = SyncDatabase::open(&db_path).unwrap();
            db.enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Create))
                .unwrap();
            db.enqueue(&PendingChange::new(&note("b", "1"), ChangeOperation::Delete))
                .unwrap();
            db.set_cursor(9).unwrap();
        }

        let db = SyncDatabase::open(&db_path).unwrap();
        let pending = db.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].operation, ChangeOperation::Delete);
        assert!(pending[1].payload.is_none());
        assert_eq!(db.get_cursor().unwrap(), Some(9));
    }

    #[test]
    fn test_audit_trail_records_queue_and_conflicts() {
        let mut db = SyncDatabase::open_memory().unwrap();
        db.enqueue(&PendingChange::new(&note("a", "1"), ChangeOperation::Create))
            .unwrap();
        db.store_conflict(&conflict("a")).unwrap();

        let events = db.recent_events(Some("a"), 10).unwrap();
        let kinds: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&EventType::ChangeQueued));
        assert!(kinds.contains(&EventType::ConflictDetected));
    }
}
