//! The sync engine.
//!
//! One [`SyncEngine`] owns one vault's sync database. A cycle pushes every
//! pending change in a single batch, interprets the per-item verdicts, then
//! pulls the remote change stream from the persisted cursor. Queue removal
//! and cursor advance only happen after the server confirmed the work, so
//! any failure can be retried by simply running another cycle.
//!
//! # Concurrency
//!
//! At most one cycle runs at a time. A trigger that arrives mid-cycle joins
//! the running cycle and receives its report. Database access is
//! synchronous and never held across an await point.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::{
    ChangeOperation, ConflictType, Note, PendingChange, Resolution, ResolutionOutcome,
    SyncConflict, SyncEnvelope,
};
use crate::storage::{Event, SyncDatabase};
use crate::sync::backoff::Backoff;
use crate::sync::conflict::{ConflictResolver, DEFAULT_AUTO_RESOLVE_THRESHOLD_MS};
use crate::sync::hash::content_hash;
use crate::sync::host::NoteStore;
use crate::sync::network::NetworkMonitor;
use crate::sync::transport::{
    AcceptedChange, ConflictedChange, PullRequest, PushRequest, RejectedChange, ServerChange,
    ServerStatus, SyncTransport,
};
use crate::sync::types::{SyncReport, SyncState, SyncStatus};

/// Construction-time settings for an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub vault_path: PathBuf,
    pub config: SyncConfig,
    pub network_monitor: NetworkMonitor,
    /// Bearer credential for the server; kept in memory only
    pub api_key: Option<String>,
}

/// What happened to one pulled change.
enum RemoteOutcome {
    Applied,
    Skipped,
    Conflicted,
}

/// Who is running the current cycle.
enum CycleSlot {
    Lead(watch::Sender<Option<SyncReport>>),
    Join(watch::Receiver<Option<SyncReport>>),
}

/// Clears the in-flight slot and the syncing flag even if the leading
/// future is dropped.
struct InflightGuard<'a> {
    slot: &'a Mutex<Option<watch::Receiver<Option<SyncReport>>>>,
    state: &'a Mutex<RuntimeState>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).syncing = false;
        *lock(self.slot) = None;
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    initialized: bool,
    syncing: bool,
    last_errors: Vec<String>,
    last_sync_at: Option<i64>,
    backoff: Backoff,
}

/// Handles owned by the background task.
struct Background {
    task: JoinHandle<()>,
    stop: oneshot::Sender<()>,
    unsubscribe: Box<dyn FnOnce() + Send + Sync>,
}

/// Local-first sync orchestrator.
pub struct SyncEngine<T, S> {
    vault_path: PathBuf,
    config: SyncConfig,
    network: NetworkMonitor,
    api_key: Option<String>,
    transport: T,
    store: S,
    db: Mutex<SyncDatabase>,
    inflight: Mutex<Option<watch::Receiver<Option<SyncReport>>>>,
    state: Mutex<RuntimeState>,
    background: Mutex<Option<Background>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stamp a server copy with the version the server reported.
fn stamp_remote(note: Note, version: i64) -> Note {
    match &note.sync {
        Some(envelope) if envelope.version == version => note,
        _ => note.with_version(version),
    }
}

impl<T, S> SyncEngine<T, S>
where
    T: SyncTransport + 'static,
    S: NoteStore + 'static,
{
    /// Open the vault's sync database and build an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn new(options: EngineOptions, transport: T, store: S) -> Result<Self> {
        let db = SyncDatabase::open(&crate::config::db_path(&options.vault_path))?;
        Ok(Self::with_database(options, db, transport, store))
    }

    /// Build an engine over an already opened database.
    pub fn with_database(options: EngineOptions, db: SyncDatabase, transport: T, store: S) -> Self {
        Self {
            vault_path: options.vault_path,
            config: options.config,
            network: options.network_monitor,
            api_key: options.api_key,
            transport,
            store,
            db: Mutex::new(db),
            inflight: Mutex::new(None),
            state: Mutex::new(RuntimeState::default()),
            background: Mutex::new(None),
        }
    }

    fn db(&self) -> MutexGuard<'_, SyncDatabase> {
        lock(&self.db)
    }

    fn device_id(&self) -> String {
        self.config.device_id_or_default().to_string()
    }

    #[must_use]
    pub fn vault_path(&self) -> &std::path::Path {
        &self.vault_path
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Load persisted state, subscribe to the network monitor, and start
    /// the polling task. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime when sync is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state cannot be read.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        if lock(&self.state).initialized {
            return Ok(());
        }

        let last_sync_at = {
            let mut db = self.db();
            if db.get_cursor()?.is_none() && self.config.last_sync_sequence > 0 {
                db.set_cursor(self.config.last_sync_sequence)?;
            }
            db.get_last_sync_at()?
        };

        {
            let mut state = lock(&self.state);
            state.last_sync_at = last_sync_at;
            state.initialized = true;
        }

        if !self.config.enabled {
            info!(vault = %self.vault_path.display(), "Sync disabled, not starting background task");
            return Ok(());
        }

        let (net_tx, net_rx) = mpsc::unbounded_channel();
        let unsubscribe = self.network.on_change(move |online| {
            let _ = net_tx.send(online);
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let interval = Duration::from_millis(self.config.effective_interval_ms());
        let task = tokio::spawn(run_background(Arc::downgrade(self), interval, net_rx, stop_rx));

        *lock(&self.background) = Some(Background {
            task,
            stop: stop_tx,
            unsubscribe: Box::new(unsubscribe),
        });

        info!(
            vault = %self.vault_path.display(),
            interval_ms = interval.as_millis(),
            online = self.network.is_online(),
            "Sync engine started"
        );
        Ok(())
    }

    /// Stop the polling task and unsubscribe from network events.
    ///
    /// A cycle already running is allowed to finish. Pending changes stay
    /// queued for the next start.
    pub async fn shutdown(&self) {
        let background = lock(&self.background).take();
        let Some(background) = background else {
            return;
        };

        (background.unsubscribe)();
        let _ = background.stop.send(());
        if let Err(e) = background.task.await {
            warn!(error = %e, "Background sync task ended abnormally");
        }
        info!("Sync engine stopped");
    }

    /// Durably queue a local change, replacing any pending change for the
    /// same note. Picked up by the next cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn queue_change(&self, note: &Note, operation: ChangeOperation) -> Result<PendingChange> {
        let change = self.db().enqueue(&PendingChange::new(note, operation))?;
        debug!(note_id = %note.id, operation = change.operation.as_str(), "Change queued");
        Ok(change)
    }

    /// Refresh a note's content hash before queuing.
    ///
    /// The version is kept as is; a note that was never synced stays
    /// without an envelope.
    #[must_use]
    pub fn add_sync_metadata(&self, mut note: Note) -> Note {
        if let Some(envelope) = note.sync.as_mut() {
            envelope.content_hash = content_hash(&note.content);
        }
        note
    }

    /// Current engine status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn get_status(&self) -> Result<SyncStatus> {
        let (pending_changes, conflicts, persisted_sync_at) = {
            let db = self.db();
            (db.count_pending()?, db.get_conflict_count()?, db.get_last_sync_at()?)
        };

        let state = lock(&self.state);
        let sync_state = if state.syncing {
            SyncState::Syncing
        } else if !self.network.is_online() {
            SyncState::Offline
        } else if !state.last_errors.is_empty() {
            SyncState::Error
        } else {
            SyncState::Idle
        };

        Ok(SyncStatus {
            state: sync_state,
            pending_changes,
            conflicts,
            last_sync_at: state.last_sync_at.or(persisted_sync_at),
            last_errors: state.last_errors.clone(),
        })
    }

    /// Unresolved conflicts awaiting a decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn get_pending_conflicts(&self) -> Result<Vec<SyncConflict>> {
        self.db().list_conflicts()
    }

    /// Queued changes in push order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn list_pending(&self) -> Result<Vec<PendingChange>> {
        self.db().list_pending()
    }

    /// Recent audit events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn recent_events(&self, note_id: Option<&str>, limit: u32) -> Result<Vec<Event>> {
        self.db().recent_events(note_id, limit)
    }

    /// Pull cursor as persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn cursor(&self) -> Result<i64> {
        Ok(self.db().get_cursor()?.unwrap_or(self.config.last_sync_sequence))
    }

    /// Probe the server.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the server cannot be reached.
    pub async fn check_server(&self) -> Result<ServerStatus> {
        self.transport.check_status().await
    }

    /// Resolve a recorded conflict and apply the outcome to the note store
    /// and the queue.
    ///
    /// # Errors
    ///
    /// Returns `ConflictNotFound` if nothing is recorded for `note_id`, or
    /// the host/database error that interrupted applying the outcome.
    pub async fn resolve_conflict(&self, note_id: &str, resolution: Resolution) -> Result<ResolutionOutcome> {
        let (conflict, outcome) = {
            let mut db = self.db();
            let conflict = db
                .get_conflict(note_id)?
                .ok_or_else(|| Error::ConflictNotFound {
                    note_id: note_id.to_string(),
                })?;
            let outcome = ConflictResolver::new(&mut db).outcome(note_id, resolution)?;
            (conflict, outcome)
        };

        // Remove the record only once every write landed.
        self.apply_outcome(&conflict, &outcome).await?;
        ConflictResolver::new(&mut self.db()).finish(note_id, resolution)?;
        Ok(outcome)
    }

    async fn apply_outcome(&self, conflict: &SyncConflict, outcome: &ResolutionOutcome) -> Result<()> {
        match outcome.resolution {
            Resolution::KeepLocal => match &outcome.resolved_note {
                Some(local) => {
                    // Rebase onto the server's version so the next push supersedes it.
                    let mut rebased = local.clone();
                    rebased.sync = Some(SyncEnvelope {
                        version: conflict.remote_version,
                        content_hash: local.content_hash(),
                    });
                    self.store.save_note(rebased.clone()).await?;
                    self.db()
                        .enqueue(&PendingChange::new(&rebased, ChangeOperation::Update))?;
                }
                None => {
                    self.db()
                        .enqueue(&PendingChange::deletion(&conflict.note_id, conflict.remote_version))?;
                }
            },
            Resolution::KeepRemote | Resolution::KeepBoth => {
                // Local content must live somewhere else before the original is overwritten.
                if let Some(copy) = &outcome.copy_note {
                    self.store.save_note(copy.clone()).await?;
                    self.db().enqueue(&PendingChange::new(copy, ChangeOperation::Create))?;
                }

                match &outcome.resolved_note {
                    Some(remote) => self.store.save_note(remote.clone()).await?,
                    None => self.store.delete_note(&conflict.note_id).await?,
                }
                self.db().dequeue(&conflict.note_id)?;
            }
        }
        Ok(())
    }

    /// Whether the polling task may start a cycle now.
    fn automatic_sync_allowed(&self) -> bool {
        let state = lock(&self.state);
        let ready = state.backoff.is_ready(Instant::now());
        if !ready {
            debug!(failures = state.backoff.failures(), "Backing off automatic sync");
        }
        ready
    }

    /// Run one sync cycle, or join the one already running.
    ///
    /// Never fails: every problem is reported in [`SyncReport::errors`].
    pub async fn trigger_sync(&self) -> SyncReport {
        if !self.config.enabled {
            return SyncReport::skipped("Sync disabled");
        }
        if !self.network.is_online() {
            debug!("Offline, skipping sync");
            return SyncReport::skipped("Offline");
        }

        let slot = {
            let mut inflight = lock(&self.inflight);
            match inflight.as_ref() {
                Some(rx) => CycleSlot::Join(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *inflight = Some(rx);
                    CycleSlot::Lead(tx)
                }
            }
        };

        match slot {
            CycleSlot::Join(mut rx) => {
                debug!("Sync already running, joining");
                match rx.wait_for(Option::is_some).await {
                    Ok(report) => (*report).clone().unwrap_or_default(),
                    Err(_) => SyncReport::skipped("Sync cycle aborted"),
                }
            }
            CycleSlot::Lead(tx) => {
                lock(&self.state).syncing = true;
                let guard = InflightGuard {
                    slot: &self.inflight,
                    state: &self.state,
                };
                let report = self.run_cycle().await;
                drop(guard);
                tx.send_replace(Some(report.clone()));
                report
            }
        }
    }

    async fn run_cycle(&self) -> SyncReport {
        info!("Sync cycle started");

        let mut report = SyncReport::default();
        let mut transport_failed = false;

        self.push_phase(&mut report, &mut transport_failed).await;
        self.pull_phase(&mut report, &mut transport_failed).await;

        let now = chrono::Utc::now().timestamp_millis();
        if !transport_failed {
            if let Err(e) = self.db().set_last_sync_at(now) {
                report.errors.push(format!("Failed to record sync time: {e}"));
            }
        }

        {
            let mut state = lock(&self.state);
            state.last_errors.clone_from(&report.errors);
            if transport_failed {
                let delay = state.backoff.record_failure();
                warn!(
                    failures = state.backoff.failures(),
                    retry_in_ms = delay.as_millis(),
                    "Sync server unreachable"
                );
            } else {
                state.backoff.reset();
                state.last_sync_at = Some(now);
            }
        }

        info!(
            pushed = report.pushed,
            pulled = report.pulled,
            conflicts = report.conflicts,
            errors = report.errors.len(),
            "Sync cycle finished"
        );
        report
    }

    // ============
    // Push Phase
    // ============

    async fn push_phase(&self, report: &mut SyncReport, transport_failed: &mut bool) {
        let pending = match self.db().list_pending() {
            Ok(pending) => pending,
            Err(e) => {
                report.errors.push(format!("Failed to read pending changes: {e}"));
                return;
            }
        };

        if pending.is_empty() {
            debug!("Nothing to push");
            return;
        }

        debug!(changes = pending.len(), "Pushing pending changes");
        let request = PushRequest {
            device_id: self.device_id(),
            changes: pending.clone(),
        };

        let response = match self.transport.push(request).await {
            Ok(response) => response,
            Err(e) => {
                *transport_failed = true;
                let message = format!("Push failed: {e}");
                warn!(error = %e, "Push failed");
                let mut db = self.db();
                for change in &pending {
                    if let Err(db_err) = db.record_push_failure(&change.note_id, &change.change_id, &message) {
                        warn!(note_id = %change.note_id, error = %db_err, "Failed to record push failure");
                    }
                }
                report.errors.push(message);
                return;
            }
        };

        let by_note: HashMap<&str, &PendingChange> =
            pending.iter().map(|c| (c.note_id.as_str(), c)).collect();

        for accepted in &response.accepted {
            let Some(change) = by_note.get(accepted.note_id.as_str()) else {
                warn!(note_id = %accepted.note_id, "Server accepted a change that was not pushed");
                continue;
            };
            match self.handle_accepted(change, accepted).await {
                Ok(()) => report.pushed += 1,
                Err(e) => report
                    .errors
                    .push(format!("{}: accepted but not recorded: {e}", accepted.note_id)),
            }
        }

        for conflicted in &response.conflicts {
            let Some(change) = by_note.get(conflicted.note_id.as_str()) else {
                warn!(note_id = %conflicted.note_id, "Server reported a conflict for a change that was not pushed");
                continue;
            };
            if let Err(e) = self.handle_push_conflict(change, conflicted, report).await {
                report
                    .errors
                    .push(format!("{}: conflict handling failed: {e}", conflicted.note_id));
            }
        }

        for rejected in &response.errors {
            self.handle_rejected(by_note.get(rejected.note_id.as_str()).copied(), rejected, report);
        }
    }

    async fn handle_accepted(&self, change: &PendingChange, accepted: &AcceptedChange) -> Result<()> {
        {
            let mut db = self.db();
            if !db.dequeue_change(&change.note_id, &change.change_id)? {
                // Edited again mid-push: keep the newer change, rebased.
                db.rebase_pending(&change.note_id, accepted.server_version)?;
            }
        }
        debug!(note_id = %change.note_id, version = accepted.server_version, "Change accepted");

        let Some(payload) = &change.payload else {
            return Ok(());
        };

        if let Some(mut current) = self.store.read_note(&change.note_id).await? {
            current.sync = Some(SyncEnvelope {
                version: accepted.server_version,
                content_hash: payload.content_hash(),
            });
            self.store.save_note(current).await?;
        }
        Ok(())
    }

    async fn handle_push_conflict(
        &self,
        change: &PendingChange,
        conflicted: &ConflictedChange,
        report: &mut SyncReport,
    ) -> Result<()> {
        let local = change.payload.as_ref();
        let remote = conflicted
            .server_note
            .clone()
            .map(|n| stamp_remote(n, conflicted.server_version));

        let conflict_type = if local.is_some() && remote.is_some() {
            ConflictType::Edit
        } else {
            ConflictType::DeleteEdit
        };

        let detected = {
            let mut db = self.db();
            ConflictResolver::new(&mut db).detect_conflict(
                local,
                remote.as_ref(),
                change.version_at_queue_time,
                conflicted.server_version,
                conflict_type,
            )?
        };

        let Some(conflict) = detected else {
            let same_content = matches!(
                (local, &remote),
                (Some(l), Some(r)) if l.content_hash() == r.content_hash()
            );
            if same_content {
                // Server already holds this content; take its version.
                let accepted = AcceptedChange {
                    note_id: change.note_id.clone(),
                    server_version: conflicted.server_version,
                    server_sequence: 0,
                };
                self.handle_accepted(change, &accepted).await?;
                report.pushed += 1;
            } else {
                let message = format!(
                    "{}: server reported a conflict at version {} but local base is version {}",
                    change.note_id, conflicted.server_version, change.version_at_queue_time
                );
                self.db()
                    .record_push_failure(&change.note_id, &change.change_id, &message)?;
                report.errors.push(message);
            }
            return Ok(());
        };

        if self.try_auto_resolve(&conflict).await? {
            return Ok(());
        }
        report.conflicts += 1;
        Ok(())
    }

    fn handle_rejected(&self, change: Option<&PendingChange>, rejected: &RejectedChange, report: &mut SyncReport) {
        warn!(
            note_id = %rejected.note_id,
            retryable = rejected.retryable,
            error = %rejected.error,
            "Server rejected change"
        );
        if let Some(change) = change {
            if let Err(e) = self
                .db()
                .record_push_failure(&change.note_id, &change.change_id, &rejected.error)
            {
                warn!(note_id = %change.note_id, error = %e, "Failed to record push failure");
            }
        }
        report
            .errors
            .push(format!("{}: {}", rejected.note_id, rejected.error));
    }

    /// Resolve by recency when possible. Returns `true` if resolved.
    async fn try_auto_resolve(&self, conflict: &SyncConflict) -> Result<bool> {
        let auto = {
            let mut db = self.db();
            ConflictResolver::new(&mut db)
                .try_auto_resolve(conflict, DEFAULT_AUTO_RESOLVE_THRESHOLD_MS)
        };
        let Some(auto) = auto else {
            return Ok(false);
        };

        info!(
            note_id = %conflict.note_id,
            resolution = auto.resolution.as_str(),
            "Conflict auto-resolved by recency"
        );
        self.resolve_conflict(&conflict.note_id, auto.resolution).await?;
        Ok(true)
    }

    // ============
    // Pull Phase
    // ============

    async fn pull_phase(&self, report: &mut SyncReport, transport_failed: &mut bool) {
        let mut cursor = match self.cursor() {
            Ok(cursor) => cursor,
            Err(e) => {
                report.errors.push(format!("Failed to read sync cursor: {e}"));
                return;
            }
        };

        loop {
            let request = PullRequest {
                device_id: self.device_id(),
                since_sequence: cursor,
            };
            let response = match self.transport.pull(request).await {
                Ok(response) => response,
                Err(e) => {
                    *transport_failed = true;
                    warn!(error = %e, cursor, "Pull failed");
                    report.errors.push(format!("Pull failed: {e}"));
                    return;
                }
            };

            debug!(
                changes = response.changes.len(),
                has_more = response.has_more,
                latest = response.latest_sequence,
                "Pulled page"
            );
            let page_start = cursor;

            for change in &response.changes {
                match self.apply_remote_change(change).await {
                    Ok(RemoteOutcome::Applied) => report.pulled += 1,
                    Ok(RemoteOutcome::Conflicted) => report.conflicts += 1,
                    Ok(RemoteOutcome::Skipped) => {}
                    Err(e) => {
                        report.errors.push(format!(
                            "Pull failed: could not apply change {} for {}: {e}",
                            change.sequence, change.note_id
                        ));
                        return;
                    }
                }

                if change.sequence > cursor {
                    if let Err(e) = self.db().set_cursor(change.sequence) {
                        report.errors.push(format!("Failed to advance sync cursor: {e}"));
                        return;
                    }
                    cursor = change.sequence;
                }
            }

            if !response.has_more {
                if response.latest_sequence > cursor {
                    if let Err(e) = self.db().set_cursor(response.latest_sequence) {
                        report.errors.push(format!("Failed to advance sync cursor: {e}"));
                        return;
                    }
                }
                return;
            }

            if cursor <= page_start {
                report.errors.push(format!(
                    "Pull failed: server reported more changes without advancing past sequence {cursor}"
                ));
                return;
            }
        }
    }

    async fn apply_remote_change(&self, change: &ServerChange) -> Result<RemoteOutcome> {
        let remote = match change.operation {
            ChangeOperation::Delete => None,
            ChangeOperation::Create | ChangeOperation::Update => {
                let note = change.note.clone().ok_or_else(|| {
                    Error::Transport(format!("{} change without a note body", change.operation.as_str()))
                })?;
                Some(stamp_remote(note, change.version))
            }
        };

        let pending = self.db().get_pending(&change.note_id)?;
        if let Some(pending) = pending {
            return self.reconcile_with_pending(change, &pending, remote).await;
        }

        match remote {
            None => {
                self.store.delete_note(&change.note_id).await?;
            }
            Some(note) => {
                if let Some(local) = self.store.read_note(&change.note_id).await? {
                    if local.version() >= change.version {
                        debug!(note_id = %change.note_id, version = change.version, "Already up to date");
                        return Ok(RemoteOutcome::Skipped);
                    }
                }
                self.store.save_note(note).await?;
            }
        }

        self.db().record_remote_applied(
            &change.note_id,
            &format!("{} v{}", change.operation.as_str(), change.version),
        )?;
        Ok(RemoteOutcome::Applied)
    }

    /// A remote change arrived for a note with an unpushed local change.
    async fn reconcile_with_pending(
        &self,
        change: &ServerChange,
        pending: &PendingChange,
        remote: Option<Note>,
    ) -> Result<RemoteOutcome> {
        if pending.version_at_queue_time >= change.version {
            debug!(note_id = %change.note_id, "Local change is newer, keeping it queued");
            return Ok(RemoteOutcome::Skipped);
        }

        let local = pending.payload.as_ref();

        if local.is_none() && remote.is_none() {
            // Both sides deleted the note.
            self.db().dequeue_change(&pending.note_id, &pending.change_id)?;
            self.store.delete_note(&change.note_id).await?;
            return Ok(RemoteOutcome::Applied);
        }

        let conflict_type = if local.is_some() && remote.is_some() {
            ConflictType::Edit
        } else {
            ConflictType::DeleteEdit
        };

        let detected = {
            let mut db = self.db();
            ConflictResolver::new(&mut db).detect_conflict(
                local,
                remote.as_ref(),
                pending.version_at_queue_time,
                change.version,
                conflict_type,
            )?
        };

        let Some(conflict) = detected else {
            // Same content on both sides: adopt the server's version.
            if let Some(note) = remote {
                self.store.save_note(note).await?;
            }
            self.db().dequeue_change(&pending.note_id, &pending.change_id)?;
            return Ok(RemoteOutcome::Applied);
        };

        if self.try_auto_resolve(&conflict).await? {
            return Ok(RemoteOutcome::Applied);
        }
        Ok(RemoteOutcome::Conflicted)
    }
}

async fn run_background<T, S>(
    engine: std::sync::Weak<SyncEngine<T, S>>,
    interval: Duration,
    mut network_events: mpsc::UnboundedReceiver<bool>,
    mut stop: oneshot::Receiver<()>,
) where
    T: SyncTransport + 'static,
    S: NoteStore + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let Some(engine) = engine.upgrade() else { break };
                if engine.network.is_online() && engine.automatic_sync_allowed() {
                    let report = engine.trigger_sync().await;
                    debug!(errors = report.errors.len(), "Timer sync finished");
                }
            }
            Some(online) = network_events.recv() => {
                let Some(engine) = engine.upgrade() else { break };
                if online {
                    info!("Back online, syncing");
                    engine.trigger_sync().await;
                } else {
                    info!("Went offline, pausing sync");
                }
            }
        }
    }
    debug!("Background sync task exiting");
}
