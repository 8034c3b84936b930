//! Conflict detection and resolution.
//!
//! Divergence is judged by version first and content second: a local copy
//! at or ahead of the server's version never conflicts, and neither do two
//! copies with identical content. Only a stale base with different content
//! is recorded.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    AutoResolution, ConflictType, Note, Resolution, ResolutionOutcome, SyncConflict,
};
use crate::storage::SyncDatabase;
use crate::sync::hash::has_changed;

/// Maximum `updated_at` distance for recency-based auto-resolution.
pub const DEFAULT_AUTO_RESOLVE_THRESHOLD_MS: i64 = 5000;

/// Suffix appended to the title of a `keep_both` copy.
pub const CONFLICT_COPY_MARKER: &str = " (conflicted copy)";

/// Decides, records, and resolves conflicts against a sync database.
pub struct ConflictResolver<'a> {
    db: &'a mut SyncDatabase,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(db: &'a mut SyncDatabase) -> Self {
        Self { db }
    }

    /// Whether two copies of a note genuinely diverge.
    ///
    /// `false` when the local base is at or ahead of the remote version, or
    /// when both contents hash equal. `true` otherwise.
    #[must_use]
    pub fn has_conflict(local: &Note, remote: &Note, local_version: i64, remote_version: i64) -> bool {
        if local_version >= remote_version {
            return false;
        }
        has_changed(&local.content_hash(), Some(&remote.content_hash()))
    }

    /// Record a conflict if the two sides diverge.
    ///
    /// A side of `None` is a deletion; with a deletion involved only the
    /// version rule applies.
    ///
    /// # Errors
    ///
    /// Returns an error if the conflict cannot be persisted.
    pub fn detect_conflict(
        &mut self,
        local: Option<&Note>,
        remote: Option<&Note>,
        local_version: i64,
        remote_version: i64,
        conflict_type: ConflictType,
    ) -> Result<Option<SyncConflict>> {
        let diverged = match (local, remote) {
            (Some(l), Some(r)) => Self::has_conflict(l, r, local_version, remote_version),
            _ => local_version < remote_version,
        };

        if !diverged {
            return Ok(None);
        }

        let note_id = local
            .or(remote)
            .map(|n| n.id.clone())
            .ok_or_else(|| Error::InvalidArgument("conflict needs at least one note".into()))?;

        let conflict = SyncConflict {
            note_id,
            local_note: local.cloned(),
            remote_note: remote.cloned(),
            local_version,
            remote_version,
            detected_at: chrono::Utc::now().timestamp_millis(),
            conflict_type,
        };

        self.db.store_conflict(&conflict)?;
        info!(
            note_id = %conflict.note_id,
            local_version,
            remote_version,
            kind = conflict.conflict_type.as_str(),
            "Conflict detected"
        );

        Ok(Some(conflict))
    }

    /// Pick the newer side when both edits landed within `threshold_ms`.
    ///
    /// Ties go to the remote copy. Delete/edit conflicts are never
    /// auto-resolved.
    #[must_use]
    pub fn try_auto_resolve(&self, conflict: &SyncConflict, threshold_ms: i64) -> Option<AutoResolution> {
        if conflict.conflict_type == ConflictType::DeleteEdit {
            return None;
        }
        let (local, remote) = (conflict.local_note.as_ref()?, conflict.remote_note.as_ref()?);

        let distance = (local.updated_at - remote.updated_at).abs();
        if distance > threshold_ms {
            debug!(note_id = %conflict.note_id, distance, threshold_ms, "Edits too far apart to auto-resolve");
            return None;
        }

        let auto = if local.updated_at > remote.updated_at {
            AutoResolution {
                resolution: Resolution::KeepLocal,
                resolved_note: local.clone(),
            }
        } else {
            AutoResolution {
                resolution: Resolution::KeepRemote,
                resolved_note: remote.clone(),
            }
        };
        Some(auto)
    }

    /// Apply a resolution and remove the conflict record.
    ///
    /// `keep_both` keeps the remote note as canonical and returns the local
    /// note as a fresh, never-synced copy.
    ///
    /// # Errors
    ///
    /// Returns `ConflictNotFound` if nothing is recorded for `note_id`.
    pub fn resolve(&mut self, note_id: &str, resolution: Resolution) -> Result<ResolutionOutcome> {
        let outcome = self.outcome(note_id, resolution)?;
        self.finish(note_id, resolution)?;
        Ok(outcome)
    }

    /// Work out what a resolution would produce, leaving the record in place.
    ///
    /// Callers that write the outcome somewhere else call [`Self::finish`]
    /// once those writes succeeded, so a failed write leaves the conflict
    /// open with both sides intact.
    ///
    /// # Errors
    ///
    /// Returns `ConflictNotFound` if nothing is recorded for `note_id`.
    pub fn outcome(&self, note_id: &str, resolution: Resolution) -> Result<ResolutionOutcome> {
        let conflict = self
            .db
            .get_conflict(note_id)?
            .ok_or_else(|| Error::ConflictNotFound {
                note_id: note_id.to_string(),
            })?;

        let outcome = match resolution {
            Resolution::KeepLocal => ResolutionOutcome {
                resolution,
                resolved_note: conflict.local_note,
                copy_note: None,
            },
            Resolution::KeepRemote => ResolutionOutcome {
                resolution,
                resolved_note: conflict.remote_note,
                copy_note: None,
            },
            Resolution::KeepBoth => ResolutionOutcome {
                resolution,
                resolved_note: conflict.remote_note,
                copy_note: conflict.local_note.map(conflicted_copy),
            },
        };
        Ok(outcome)
    }

    /// Remove the conflict record for a resolved note.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be deleted.
    pub fn finish(&mut self, note_id: &str, resolution: Resolution) -> Result<()> {
        self.db.remove_conflict(note_id, resolution.as_str())?;
        info!(note_id, resolution = resolution.as_str(), "Conflict resolved");
        Ok(())
    }
}

/// Turn a local note into an independent, never-synced note.
fn conflicted_copy(mut note: Note) -> Note {
    note.id = uuid::Uuid::new_v4().to_string();
    note.title.push_str(CONFLICT_COPY_MARKER);
    note.sync = None;
    note.created_at = chrono::Utc::now().timestamp_millis();
    note
}
