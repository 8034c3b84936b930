//! notesync - local-first note synchronization
//!
//! This crate keeps a local vault of notes consistent with a remote server
//! across unreliable networks, concurrent edits from several devices, and
//! process restarts.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Note, PendingChange, SyncConflict)
//! - [`storage`] - SQLite sync database
//! - [`sync`] - Sync engine, conflict resolution, transport, network monitor
//! - [`config`] - Vault resolution and configuration
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
