//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// notesync - local-first note sync engine
#[derive(Parser, Debug)]
#[command(name = "notesync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (default: ~/.notesync/vault)
    #[arg(long, global = true, env = "NOTESYNC_VAULT")]
    pub vault: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up sync state for a vault
    Init {
        /// Sync server base URL
        #[arg(long)]
        server_url: Option<String>,

        /// Enable sync right away
        #[arg(long)]
        enable: bool,
    },

    /// Print version information
    Version,

    /// Show sync status
    Status,

    /// List changes waiting to be pushed
    Pending,

    /// List unresolved conflicts
    Conflicts,

    /// Resolve a conflict
    Resolve {
        /// Note in conflict
        note_id: String,

        /// Which side to keep
        #[arg(value_enum)]
        choice: ResolutionChoice,
    },

    /// Run one sync cycle now
    Sync,

    /// Queue a local note change
    Queue {
        /// Note JSON file
        file: PathBuf,

        /// Queue a deletion of the note instead of an edit
        #[arg(long)]
        delete: bool,
    },

    /// Show the sync audit trail
    Events {
        /// Only events for this note
        #[arg(long)]
        note: Option<String>,

        /// Maximum number of events
        #[arg(long, short = 'n', default_value = "20")]
        limit: u32,
    },

    /// Show or change sync configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Conflict resolution choice.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionChoice {
    /// Keep the local copy and push it over the server's
    KeepLocal,
    /// Take the server's copy and drop the local edit
    KeepRemote,
    /// Take the server's copy and keep the local edit as a new note
    KeepBoth,
}

impl From<ResolutionChoice> for crate::model::Resolution {
    fn from(choice: ResolutionChoice) -> Self {
        match choice {
            ResolutionChoice::KeepLocal => Self::KeepLocal,
            ResolutionChoice::KeepRemote => Self::KeepRemote,
            ResolutionChoice::KeepBoth => Self::KeepBoth,
        }
    }
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Set one configuration key
    Set {
        /// enabled, server_url, device_id, sync_interval_ms, last_sync_sequence
        key: String,

        /// New value
        value: String,
    },
}
