//! Data models for notesync.
//!
//! This module contains the domain models:
//! - Note and its sync envelope
//! - PendingChange
//! - SyncConflict and resolutions

pub mod change;
pub mod note;

pub use change::{
    AutoResolution, ChangeOperation, ConflictType, PendingChange, Resolution, ResolutionOutcome,
    SyncConflict,
};
pub use note::{Note, SyncEnvelope};
