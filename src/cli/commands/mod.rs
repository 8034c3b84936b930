//! Command implementations.

pub mod config;
pub mod conflicts;
pub mod init;
pub mod status;
pub mod sync;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{
    ensure_device_id, load_effective_config, resolve_api_key, resolve_vault_path, state_dir,
};
use crate::error::{Error, Result};
use crate::sync::{EngineOptions, FileNoteStore, HttpTransport, NetworkMonitor, SyncEngine};

/// Engine type used by the CLI.
pub type CliEngine = SyncEngine<HttpTransport, FileNoteStore>;

/// Resolve the vault and fail if it has no sync state yet.
pub(crate) fn initialized_vault(vault: Option<&PathBuf>) -> Result<PathBuf> {
    let vault = resolve_vault_path(vault.map(PathBuf::as_path))?;
    let state = state_dir(&vault);
    if !state.is_dir() {
        return Err(Error::NotInitialized { path: state });
    }
    Ok(vault)
}

/// Build an engine over the vault's file note store and HTTP transport.
///
/// The network monitor starts in the given state; no background task is
/// started.
pub(crate) fn open_engine(vault: &Path, online: bool) -> Result<CliEngine> {
    let mut config = load_effective_config(vault)?;
    ensure_device_id(vault, &mut config)?;

    let api_key = resolve_api_key();
    let transport = HttpTransport::new(
        config.server_url.as_deref().unwrap_or_default(),
        api_key.clone(),
        config.device_id_or_default(),
    )?;

    let options = EngineOptions {
        vault_path: vault.to_path_buf(),
        config,
        network_monitor: NetworkMonitor::new(online),
        api_key,
    };
    SyncEngine::new(options, transport, FileNoteStore::for_vault(vault))
}

/// Create the tokio runtime for async commands.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
