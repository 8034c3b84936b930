//! Database schema definitions.
//!
//! One sync database exists per vault. It holds the pending-change queue,
//! unresolved conflicts, the pull cursor, and an audit trail.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The base SQL schema for the sync database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds). Note snapshots are
/// stored as JSON text.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Sync Tables
-- ====================

-- Pending changes: at most one row per note (upsert replaces)
CREATE TABLE IF NOT EXISTS pending_changes (
    note_id TEXT PRIMARY KEY,
    change_id TEXT NOT NULL,
    operation TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
    payload TEXT,
    version_at_queue_time INTEGER NOT NULL DEFAULT 0,
    queued_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pending_changes_queued ON pending_changes(queued_at);

-- Conflicts: exist only while unresolved, keyed by note
CREATE TABLE IF NOT EXISTS sync_conflicts (
    note_id TEXT PRIMARY KEY,
    local_note TEXT,
    remote_note TEXT,
    local_version INTEGER NOT NULL,
    remote_version INTEGER NOT NULL,
    conflict_type TEXT NOT NULL DEFAULT 'edit',
    detected_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_conflicts_detected ON sync_conflicts(detected_at);

-- Key/value engine state (pull cursor, last sync time)
CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ====================
-- Audit Trail
-- ====================

CREATE TABLE IF NOT EXISTS sync_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    detail TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_events_note ON sync_events(note_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_sync_events_created ON sync_events(created_at DESC);
";

/// Apply pragmas, the base schema, and pending migrations.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
