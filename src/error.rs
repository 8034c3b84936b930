//! Error types for notesync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for notesync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ConflictNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Sync (exit 6)
    TransportError,
    HostError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ConflictNotFound => "CONFLICT_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::HostError => "HOST_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::ConflictNotFound => 3,
            Self::InvalidArgument => 4,
            Self::TransportError | Self::HostError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the failed operation is worth retrying unchanged.
    ///
    /// Transport failures cover timeouts, DNS and 5xx responses, so a later
    /// attempt may succeed. Busy databases clear once the other writer is done.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError | Self::DatabaseError | Self::HostError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in notesync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Vault not initialized at {path}")]
    NotInitialized { path: PathBuf },

    #[error("No conflict recorded for note: {note_id}")]
    ConflictNotFound { note_id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Note store error: {0}")]
    Host(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::ConflictNotFound { .. } => ErrorCode::ConflictNotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Host(_) => ErrorCode::HostError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "No sync state under {}. Run `notesync init --server-url <url>` to set up the vault.",
                path.display()
            )),

            Self::ConflictNotFound { note_id } => Some(format!(
                "Note '{note_id}' has no open conflict. Use `notesync conflicts` to list unresolved conflicts."
            )),

            Self::Transport(_) => Some(
                "The server could not be reached. Pending changes stay queued; retry with `notesync sync`."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("resolution") {
                    Some("Valid resolutions: keep-local, keep-remote, keep-both".to_string())
                } else if msg.contains("operation") {
                    Some("Valid operations: create, update, delete".to_string())
                } else {
                    None
                }
            }

            Self::Config(_) => Some(
                "Check <vault>/.notesync/config.json or the NOTESYNC_* environment variables."
                    .to_string(),
            ),

            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Host(_) | Self::Other(_) => {
                None
            }
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
