//! Read-only inspection commands: status, pending, events.

use crate::cli::commands::{initialized_vault, open_engine};
use crate::error::Result;
use crate::sync::{print_events, print_pending, print_status, SyncStatus};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct StatusOutput<'a> {
    vault: PathBuf,
    enabled: bool,
    server_url: Option<&'a str>,
    device_id: &'a str,
    cursor: i64,
    #[serde(flatten)]
    status: SyncStatus,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the vault is not initialized or the database fails.
pub fn execute(vault: Option<&PathBuf>, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    // Never contacts the server, so connectivity is assumed.
    let engine = open_engine(&vault, true)?;
    let status = engine.get_status()?;
    let cursor = engine.cursor()?;

    if json {
        let config = engine.config();
        let output = StatusOutput {
            vault: vault.clone(),
            enabled: config.enabled,
            server_url: config.server_url.as_deref(),
            device_id: config.device_id_or_default(),
            cursor,
            status,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_status(&status, cursor);
    }
    Ok(())
}

/// Execute the pending command.
///
/// # Errors
///
/// Returns an error if the vault is not initialized or the database fails.
pub fn execute_pending(vault: Option<&PathBuf>, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    let engine = open_engine(&vault, true)?;
    let pending = engine.list_pending()?;

    if json {
        let output = serde_json::json!({
            "count": pending.len(),
            "changes": pending,
        });
        println!("{output}");
    } else {
        print_pending(&pending);
    }
    Ok(())
}

/// Execute the events command.
///
/// # Errors
///
/// Returns an error if the vault is not initialized or the database fails.
pub fn execute_events(vault: Option<&PathBuf>, note: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;
    let engine = open_engine(&vault, true)?;
    let events = engine.recent_events(note, limit)?;

    if json {
        println!("{}", serde_json::to_string(&events)?);
    } else {
        print_events(&events);
    }
    Ok(())
}
