//! Sync and queue command implementations.
//!
//! `sync` runs exactly one cycle against the configured server. `queue`
//! acts as the host: it writes the note into the vault's note store and
//! queues the change for the next cycle.

use crate::cli::commands::{initialized_vault, open_engine, runtime};
use crate::config::{load_config, save_config};
use crate::error::{Error, Result};
use crate::model::{ChangeOperation, Note};
use crate::sync::{FileNoteStore, NoteStore};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Execute the sync command.
///
/// Probes the server first; an unreachable server makes the cycle an
/// offline no-op instead of a failed push.
///
/// # Errors
///
/// Returns an error if the vault is not initialized, no server URL is
/// configured, or the database fails. Cycle errors are printed, not returned.
pub fn execute_sync(vault: Option<&PathBuf>, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    let engine = open_engine(&vault, true)?;

    if engine.config().server_url.is_none() {
        return Err(Error::Config(
            "No server URL configured (set server_url or NOTESYNC_SERVER_URL)".into(),
        ));
    }
    if !engine.has_api_key() {
        warn!("NOTESYNC_API_KEY not set, sending unauthenticated requests");
    }

    let rt = runtime()?;
    let report = rt.block_on(async {
        if let Err(e) = engine.check_server().await {
            warn!(error = %e, "Server unreachable");
            engine.network().set_online(false);
        }
        engine.trigger_sync().await
    });

    // Mirror the cursor into the config file
    let cursor = engine.cursor()?;
    let mut config = load_config(&vault)?;
    if config.last_sync_sequence != cursor {
        config.last_sync_sequence = cursor;
        save_config(&vault, &config)?;
    }

    let pending = engine.list_pending()?.len();

    if json {
        let output = serde_json::json!({
            "pushed": report.pushed,
            "pulled": report.pulled,
            "conflicts": report.conflicts,
            "errors": report.errors,
            "pending": pending,
            "cursor": cursor,
        });
        println!("{output}");
        return Ok(());
    }

    if report.is_clean() {
        println!("{}", "Sync complete".green().bold());
    } else {
        println!("{}", "Sync finished with errors".yellow().bold());
    }
    println!("  Pushed:    {}", report.pushed);
    println!("  Pulled:    {}", report.pulled);
    println!("  Conflicts: {}", report.conflicts);
    println!("  Pending:   {pending}");
    for error in &report.errors {
        println!("  {} {error}", "!".red());
    }
    if report.conflicts > 0 {
        println!();
        println!("{}", "Run 'notesync conflicts' to review.".dimmed());
    }
    Ok(())
}

/// Execute the queue command.
///
/// # Errors
///
/// Returns an error if the file is not a valid note, the vault is not
/// initialized, or the note store or database fails.
pub fn execute_queue(vault: Option<&PathBuf>, file: &Path, delete: bool, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;

    let text = fs::read_to_string(file)
        .map_err(|e| Error::InvalidArgument(format!("cannot read {}: {e}", file.display())))?;
    let note: Note = serde_json::from_str(&text)?;

    let engine = open_engine(&vault, true)?;
    let note = engine.add_sync_metadata(note);

    let operation = if delete {
        ChangeOperation::Delete
    } else if note.is_synced() {
        ChangeOperation::Update
    } else {
        ChangeOperation::Create
    };

    let store = FileNoteStore::for_vault(&vault);
    let rt = runtime()?;
    rt.block_on(async {
        if delete {
            store.delete_note(&note.id).await
        } else {
            store.save_note(note.clone()).await
        }
    })?;

    let change = engine.queue_change(&note, operation)?;

    if json {
        println!("{}", serde_json::to_string(&change)?);
    } else {
        println!(
            "Queued {} for {} ({} pending)",
            change.operation.as_str(),
            change.note_id,
            engine.list_pending()?.len()
        );
    }
    Ok(())
}
