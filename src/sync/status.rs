//! Sync status display.
//!
//! Human-readable rendering of engine status, the pending queue, and
//! unresolved conflicts for the CLI.

use colored::Colorize;

use crate::model::{PendingChange, SyncConflict};
use crate::storage::Event;
use crate::sync::types::{SyncState, SyncStatus};

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus, cursor: i64) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    let state = match status.state {
        SyncState::Idle => "idle".green(),
        SyncState::Syncing => "syncing".cyan(),
        SyncState::Offline => "offline".yellow(),
        SyncState::Error => "error".red(),
    };
    println!("  State:     {state}");
    println!("  Pending:   {}", status.pending_changes);
    if status.conflicts > 0 {
        println!("  Conflicts: {}", status.conflicts.to_string().red().bold());
    } else {
        println!("  Conflicts: 0");
    }
    println!("  Cursor:    {cursor}");
    println!("  Last sync: {}", format_timestamp(status.last_sync_at));

    if !status.last_errors.is_empty() {
        println!();
        println!("{}", "Last Errors:".red().bold());
        for error in &status.last_errors {
            println!("  - {error}");
        }
    }

    println!();
    if status.conflicts > 0 {
        println!(
            "{}",
            "Run 'notesync conflicts' to review, then 'notesync resolve <note-id> <choice>'.".dimmed()
        );
    } else if status.pending_changes > 0 {
        println!("{}", "Run 'notesync sync' to push pending changes.".dimmed());
    } else {
        println!("{}", "Everything is up to date.".green());
    }
}

/// Print the pending queue.
pub fn print_pending(changes: &[PendingChange]) {
    if changes.is_empty() {
        println!("{}", "No pending changes.".dimmed());
        return;
    }

    println!("{}", format!("Pending Changes ({})", changes.len()).bold());
    for change in changes {
        let op = match change.operation {
            crate::model::ChangeOperation::Create => "create".green(),
            crate::model::ChangeOperation::Update => "update".blue(),
            crate::model::ChangeOperation::Delete => "delete".red(),
        };
        print!(
            "  {op:<6} {} (base v{}, queued {})",
            change.note_id,
            change.version_at_queue_time,
            format_timestamp(Some(change.queued_at))
        );
        if change.attempts > 0 {
            print!(
                " {}",
                format!(
                    "[{} failed: {}]",
                    change.attempts,
                    change.last_error.as_deref().unwrap_or("unknown")
                )
                .yellow()
            );
        }
        println!();
    }
}

/// Print unresolved conflicts.
pub fn print_conflicts(conflicts: &[SyncConflict]) {
    if conflicts.is_empty() {
        println!("{}", "No conflicts.".green());
        return;
    }

    println!("{}", format!("Conflicts ({})", conflicts.len()).red().bold());
    for conflict in conflicts {
        let title = conflict
            .local_note
            .as_ref()
            .or(conflict.remote_note.as_ref())
            .map_or("(deleted)", |n| n.title.as_str());
        println!(
            "  {} {} [{}] local v{} vs remote v{}",
            conflict.note_id.bold(),
            title,
            conflict.conflict_type.as_str(),
            conflict.local_version,
            conflict.remote_version
        );
        println!(
            "    {}",
            format!(
                "local: {}  remote: {}",
                side_summary(conflict.local_note.as_ref()),
                side_summary(conflict.remote_note.as_ref())
            )
            .dimmed()
        );
    }
}

/// Print audit events.
pub fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("{}", "No sync events.".dimmed());
        return;
    }

    for event in events {
        println!(
            "  {}  {:<20} {} {}",
            format_timestamp(Some(event.created_at)).dimmed(),
            event.event_type.as_str(),
            event.note_id,
            event.detail.as_deref().unwrap_or_default()
        );
    }
}

fn side_summary(note: Option<&crate::model::Note>) -> String {
    note.map_or_else(
        || "deleted".to_string(),
        |n| format!("edited {}", format_timestamp(Some(n.updated_at))),
    )
}

/// Format a Unix-millisecond timestamp as local-independent UTC.
fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(None), "never");
        assert_eq!(format_timestamp(Some(0)), "1970-01-01 00:00:00 UTC");
        assert_eq!(
            format_timestamp(Some(1_700_000_000_000)),
            "2023-11-14 22:13:20 UTC"
        );
    }
}
