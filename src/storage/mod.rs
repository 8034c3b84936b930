//! SQLite storage layer for notesync.
//!
//! This module provides the durable sync database using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for sync history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`migrations`] - Incremental schema changes
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - The sync database itself

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{MutationContext, SyncDatabase};
