//! Database migrations embedded at compile time.
//!
//! Each migration is a SQL batch applied once and recorded in the
//! `schema_migrations` table.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order.
///
/// One ALTER per migration: a batch stops at its first failing statement, so
/// a tolerated duplicate column must not hide the statements after it.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_pending_attempts",
        sql: "ALTER TABLE pending_changes ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;",
    },
    Migration {
        version: "002_pending_last_error",
        sql: "ALTER TABLE pending_changes ADD COLUMN last_error TEXT;",
    },
    Migration {
        version: "003_conflict_type_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_type ON sync_conflicts(conflict_type);",
    },
];

/// Run all pending migrations on the database.
///
/// Already-applied migrations are skipped, so this is safe to call on every
/// open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. ALTER TABLE errors for
/// duplicate columns are logged and the migration is marked complete.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            if e.to_string().contains("duplicate column name") {
                warn!(
                    version = migration.version,
                    "Migration partially applied (columns exist), marking complete"
                );
            } else {
                return Err(e);
            }
        }

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;

        info!(version = migration.version, "Migration complete");
    }

    Ok(())
}
