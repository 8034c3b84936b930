//! Config command implementations.

use crate::cli::commands::initialized_vault;
use crate::cli::ConfigCommands;
use crate::config::{config_path, load_config, load_effective_config, resolve_api_key, save_config};
use crate::error::Result;
use std::path::PathBuf;

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the vault is not initialized, the key or value is
/// invalid, or the config file cannot be written.
pub fn execute(command: &ConfigCommands, vault: Option<&PathBuf>, json: bool) -> Result<()> {
    let vault = initialized_vault(vault)?;

    match command {
        ConfigCommands::Show => {
            let config = load_effective_config(&vault)?;
            let api_key_set = resolve_api_key().is_some();

            if json {
                let output = serde_json::json!({
                    "path": config_path(&vault),
                    "config": config,
                    "api_key_set": api_key_set,
                });
                println!("{output}");
            } else {
                println!("Config: {}", config_path(&vault).display());
                println!("  enabled:            {}", config.enabled);
                println!(
                    "  server_url:         {}",
                    config.server_url.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "  device_id:          {}",
                    config.device_id.as_deref().unwrap_or("(not set)")
                );
                println!("  sync_interval_ms:   {}", config.sync_interval_ms);
                println!("  last_sync_sequence: {}", config.last_sync_sequence);
                println!(
                    "  api key:            {}",
                    if api_key_set { "set (NOTESYNC_API_KEY)" } else { "not set" }
                );
            }
        }
        ConfigCommands::Set { key, value } => {
            // Stored config only; env overrides stay out of the file.
            let mut config = load_config(&vault)?;
            config.set_value(key, value)?;
            save_config(&vault, &config)?;

            if json {
                println!("{}", serde_json::json!({ "key": key, "value": value }));
            } else {
                println!("Set {key} = {value}");
            }
        }
    }
    Ok(())
}
