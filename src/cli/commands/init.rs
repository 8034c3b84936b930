//! Initialize sync state for a vault.
//!
//! Creates `<vault>/.notesync/` with a config file, a device id, and an
//! empty sync database. Running it again keeps existing state and only
//! applies the given flags.

use crate::config::{db_path, ensure_device_id, load_config, resolve_vault_path, save_config, state_dir};
use crate::error::Result;
use crate::storage::SyncDatabase;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    vault: PathBuf,
    database: PathBuf,
    device_id: String,
    enabled: bool,
    server_url: Option<String>,
    created: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory, config, or database cannot be created.
pub fn execute(vault: Option<&PathBuf>, server_url: Option<&str>, enable: bool, json: bool) -> Result<()> {
    let vault = resolve_vault_path(vault.map(PathBuf::as_path))?;
    let state = state_dir(&vault);
    let created = !state.exists();

    fs::create_dir_all(&state)?;

    // Local-only state
    let gitignore_path = state.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, "*\n")?;
    }

    let mut config = load_config(&vault)?;
    if let Some(url) = server_url {
        config.server_url = Some(url.to_string());
    }
    if enable {
        config.enabled = true;
    }
    save_config(&vault, &config)?;
    ensure_device_id(&vault, &mut config)?;

    let database = db_path(&vault);
    SyncDatabase::open(&database)?;

    if json {
        let output = InitOutput {
            vault,
            database,
            device_id: config.device_id_or_default().to_string(),
            enabled: config.enabled,
            server_url: config.server_url,
            created,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        if created {
            println!("Initialized notesync vault at {}", vault.display());
        } else {
            println!("Updated notesync vault at {}", vault.display());
        }
        println!("  Database:  {}", database.display());
        println!("  Device:    {}", config.device_id_or_default());
        println!("  Server:    {}", config.server_url.as_deref().unwrap_or("(not set)"));
        println!("  Enabled:   {}", config.enabled);
        if !config.enabled {
            println!();
            println!("Next: Run 'notesync config set enabled true' once the server URL is set.");
        }
    }

    Ok(())
}
