//! Sync engine status and cycle reports.

use serde::{Deserialize, Serialize};

/// Coarse engine state reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No cycle running and the last one finished cleanly.
    Idle,
    /// A cycle is in flight.
    Syncing,
    /// The network monitor reports no connectivity.
    Offline,
    /// The last cycle reported errors. Not terminal.
    Error,
}

impl SyncState {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }
}

/// Derived engine status. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending_changes: usize,
    pub conflicts: usize,
    /// Completion time of the last cycle that reached the server (Unix ms)
    pub last_sync_at: Option<i64>,
    /// Error strings from the last cycle
    #[serde(default)]
    pub last_errors: Vec<String>,
}

/// Summary of one sync cycle.
///
/// Every failure during a cycle is flattened into `errors`; a cycle itself
/// never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Changes the server accepted
    pub pushed: usize,
    /// Remote changes applied locally
    pub pulled: usize,
    /// Conflicts left for explicit resolution
    pub conflicts: usize,
    /// Human-readable error messages
    pub errors: Vec<String>,
}

impl SyncReport {
    /// A report for a cycle that never reached the transport.
    #[must_use]
    pub fn skipped(reason: &str) -> Self {
        Self {
            errors: vec![reason.to_string()],
            ..Self::default()
        }
    }

    /// Whether the cycle finished without any error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
