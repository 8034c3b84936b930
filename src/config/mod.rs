//! Configuration management.
//!
//! This module resolves the vault directory, locates the per-vault state
//! directory, and loads and saves the sync configuration.
//!
//! # Layout
//!
//! Every vault keeps its sync state next to its notes:
//! - **Config**: `<vault>/.notesync/config.json`
//! - **Database**: `<vault>/.notesync/sync.db`
//! - **Notes**: `<vault>/notes/<id>.json` (when the file store is used)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Name of the per-vault state directory.
pub const STATE_DIR: &str = ".notesync";

/// Default background polling cadence.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;

/// Lower bound on the polling cadence.
pub const MIN_SYNC_INTERVAL_MS: u64 = 1_000;

/// Sync settings for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether background and manual sync are allowed
    pub enabled: bool,

    /// Base URL of the sync server
    pub server_url: Option<String>,

    /// Stable identifier of this device
    pub device_id: Option<String>,

    /// Last server sequence known when the config was written
    pub last_sync_sequence: i64,

    /// Background polling cadence while online
    pub sync_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            device_id: None,
            last_sync_sequence: 0,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
        }
    }
}

impl SyncConfig {
    /// Polling cadence clamped to the supported minimum.
    #[must_use]
    pub fn effective_interval_ms(&self) -> u64 {
        self.sync_interval_ms.max(MIN_SYNC_INTERVAL_MS)
    }

    /// Device id, or an empty string if none was assigned.
    #[must_use]
    pub fn device_id_or_default(&self) -> &str {
        self.device_id.as_deref().unwrap_or_default()
    }

    /// Replace the server URL with a non-empty override.
    pub fn override_server_url(&mut self, value: Option<&str>) {
        if let Some(url) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.server_url = Some(url.to_string());
        }
    }

    /// Set a single field from its string form (used by `config set`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown key or an unparsable value.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |what: &str| Error::InvalidArgument(format!("invalid {what} '{value}'"));

        match key.replace('-', "_").as_str() {
            "enabled" => {
                self.enabled = match value.to_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => return Err(invalid("boolean")),
                };
            }
            "server_url" => {
                self.server_url = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            "device_id" => {
                self.device_id = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            "sync_interval_ms" => {
                self.sync_interval_ms = value.parse().map_err(|_| invalid("interval"))?;
            }
            "last_sync_sequence" => {
                self.last_sync_sequence = value.parse().map_err(|_| invalid("sequence"))?;
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown config key '{other}' (expected enabled, server_url, device_id, sync_interval_ms, last_sync_sequence)"
                )));
            }
        }
        Ok(())
    }
}

/// Get the global notesync directory (`~/.notesync`).
#[must_use]
pub fn global_notesync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".notesync"))
}

/// Resolve the vault directory.
///
/// Priority:
/// 1. If `explicit` is provided, use it directly
/// 2. `NOTESYNC_VAULT` environment variable
/// 3. Default location: `~/.notesync/vault`
///
/// # Errors
///
/// Returns `Config` if no home directory can be determined.
pub fn resolve_vault_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(vault) = std::env::var("NOTESYNC_VAULT") {
        if !vault.trim().is_empty() {
            return Ok(PathBuf::from(vault));
        }
    }

    global_notesync_dir()
        .map(|dir| dir.join("vault"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Per-vault state directory.
#[must_use]
pub fn state_dir(vault: &Path) -> PathBuf {
    vault.join(STATE_DIR)
}

/// Path of the vault's config file.
#[must_use]
pub fn config_path(vault: &Path) -> PathBuf {
    state_dir(vault).join("config.json")
}

/// Path of the vault's sync database.
#[must_use]
pub fn db_path(vault: &Path) -> PathBuf {
    state_dir(vault).join("sync.db")
}

/// Load the vault's sync configuration. A missing file yields defaults.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_config(vault: &Path) -> Result<SyncConfig> {
    let path = config_path(vault);

    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(SyncConfig::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save the vault's sync configuration.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_config(vault: &Path, config: &SyncConfig) -> Result<()> {
    let path = config_path(vault);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(&path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Load config and apply environment overrides.
///
/// `NOTESYNC_SERVER_URL` replaces the server URL for this process only; it
/// is not written back.
///
/// # Errors
///
/// Returns an error if the config file is unreadable.
pub fn load_effective_config(vault: &Path) -> Result<SyncConfig> {
    let mut config = load_config(vault)?;
    config.override_server_url(std::env::var("NOTESYNC_SERVER_URL").ok().as_deref());
    Ok(config)
}

/// API key from `NOTESYNC_API_KEY`. Never persisted.
#[must_use]
pub fn resolve_api_key() -> Option<String> {
    std::env::var("NOTESYNC_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

/// Assign and persist a device id if the config has none.
///
/// Returns `true` if a new id was generated.
///
/// # Errors
///
/// Returns an error if the updated config cannot be saved.
pub fn ensure_device_id(vault: &Path, config: &mut SyncConfig) -> Result<bool> {
    if config.device_id.as_deref().is_some_and(|id| !id.is_empty()) {
        return Ok(false);
    }

    let mut stored = load_config(vault)?;
    let id = stored
        .device_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    stored.device_id = Some(id.clone());
    save_config(vault, &stored)?;
    config.device_id = Some(id);

    info!(device_id = config.device_id_or_default(), "Assigned device id");
    Ok(true)
}
