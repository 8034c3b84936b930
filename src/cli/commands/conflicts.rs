//! Conflict listing and resolution commands.

use crate::cli::commands::{initialized_vault, open_engine, runtime};
use crate::cli::ResolutionChoice;
use crate::error::Result;
use crate::model::Resolution;
use crate::sync::print_conflicts;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the conflicts command.
///
/// # Errors
///
/// Returns an error if the vault is not initialized or the database fails.
pub fn execute_list(vault: Option<&PathBuf>, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    let engine = open_engine(&vault, true)?;
    let conflicts = engine.get_pending_conflicts()?;

    if json {
        let output = serde_json::json!({
            "count": conflicts.len(),
            "conflicts": conflicts,
        });
        println!("{output}");
    } else {
        print_conflicts(&conflicts);
    }
    Ok(())
}

/// Execute the resolve command.
///
/// # Errors
///
/// Returns `ConflictNotFound` if the note has no open conflict, or the
/// note-store error that interrupted applying the resolution.
pub fn execute_resolve(vault: Option<&PathBuf>, note_id: &str, choice: ResolutionChoice, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    let engine = open_engine(&vault, true)?;
    let resolution = Resolution::from(choice);

    let rt = runtime()?;
    let outcome = rt.block_on(engine.resolve_conflict(note_id, resolution))?;

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
        return Ok(());
    }

    println!(
        "{} {note_id} with {}",
        "Resolved".green().bold(),
        resolution.as_str()
    );
    match resolution {
        Resolution::KeepLocal => {
            println!("  Local copy queued to overwrite the server on next sync.");
        }
        Resolution::KeepRemote => {
            println!("  Server copy applied; local edit dropped.");
        }
        Resolution::KeepBoth => {
            println!("  Server copy applied.");
            if let Some(copy) = &outcome.copy_note {
                println!("  Local edit kept as new note {} \"{}\".", copy.id, copy.title);
            }
        }
    }
    Ok(())
}
