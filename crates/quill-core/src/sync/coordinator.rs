//! Synchronization coordinator.
//!
//! The coordinator is the only entry point callers use: reads come from the
//! local index, writes land locally and are enqueued in the same transaction,
//! and network work (drain and pull) happens on explicit calls or from the
//! [`SyncScheduler`](super::SyncScheduler).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::{broadcast, Notify};

use super::events::{DrainReport, PullReport, SyncEvent};
use super::merge::{self, MergeDecision};
use super::queue::SyncQueue;
use crate::connectivity::ConnectivityDetector;
use crate::db::{
    Database, IndexStore, ListFilter, OperationLog, SharedDatabase, SortOrder, SqliteIndexStore,
    SqliteOperationLog, WriteMode,
};
use crate::error::{Error, Result};
use crate::models::{
    IndexEntry, NoteDraft, NoteId, NotePatch, NoteRecord, Operation, OperationPayload, SyncStatus,
};
use crate::remote::{RemoteError, RemoteFilter, RemoteNotes};
use crate::util::now_millis;

/// Timing knobs for network work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound for a single transmission or list request
    pub request_timeout: Duration,
    /// Period of the scheduler's reachability probe and pull
    pub sync_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            sync_interval: Duration::from_secs(60),
        }
    }
}

/// Result of [`SyncCoordinator::sync_now`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// `None` when the drain did not run
    pub drain: Option<DrainReport>,
    pub pull: Option<PullReport>,
    pub pull_error: Option<String>,
}

/// Point-in-time view of the sync machinery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatusSnapshot {
    pub online: bool,
    pub draining: bool,
    pub queued: usize,
    pub rejected: usize,
    pub last_pull_at: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SyncState {
    last_pull_at: Option<i64>,
    last_error: Option<String>,
}

/// Local-first read/write API backed by the index and the operation queue
///
/// Cloning yields another handle to the same engine.
pub struct SyncCoordinator<R> {
    db: SharedDatabase,
    remote: Arc<R>,
    connectivity: ConnectivityDetector,
    queue: SyncQueue<R>,
    options: SyncOptions,
    pulling: Arc<AtomicBool>,
    state: Arc<Mutex<SyncState>>,
}

impl<R> Clone for SyncCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            remote: Arc::clone(&self.remote),
            connectivity: self.connectivity.clone(),
            queue: self.queue.clone(),
            options: self.options,
            pulling: Arc::clone(&self.pulling),
            state: Arc::clone(&self.state),
        }
    }
}

impl<R: RemoteNotes> SyncCoordinator<R> {
    pub fn new(
        db: Database,
        remote: Arc<R>,
        connectivity: ConnectivityDetector,
        options: SyncOptions,
    ) -> Self {
        let db = db.into_shared();
        let queue = SyncQueue::new(
            db.clone(),
            Arc::clone(&remote),
            connectivity.clone(),
            options.request_timeout,
        );
        Self {
            db,
            remote,
            connectivity,
            queue,
            options,
            pulling: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    // ---- reads ----

    /// Local entries matching `filter`, returned without waiting on the network.
    ///
    /// When online, a pull with the same filter is started in the background;
    /// its result arrives as [`SyncEvent::PullFinished`].
    pub fn read_all(&self, filter: &ListFilter) -> Result<Vec<IndexEntry>> {
        let entries = self.list(filter, SortOrder::default())?;
        if self.connectivity.is_online() {
            self.spawn_pull(RemoteFilter::from(filter));
        }
        Ok(entries)
    }

    pub fn list(&self, filter: &ListFilter, sort: SortOrder) -> Result<Vec<IndexEntry>> {
        self.db
            .with(|conn| SqliteIndexStore::new(conn).list(filter, sort))
    }

    pub fn search(&self, query: &str) -> Result<Vec<IndexEntry>> {
        self.db.with(|conn| SqliteIndexStore::new(conn).search(query))
    }

    pub fn get(&self, id: &NoteId) -> Result<Option<IndexEntry>> {
        self.db.with(|conn| SqliteIndexStore::new(conn).get(id))
    }

    /// Up to `limit` note IDs starting with `prefix`
    pub fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<NoteId>> {
        self.db
            .with(|conn| SqliteIndexStore::new(conn).ids_with_prefix(prefix, limit))
    }

    /// Full document including the body
    pub fn record(&self, id: &NoteId) -> Result<Option<NoteRecord>> {
        self.db.with(|conn| SqliteIndexStore::new(conn).record(id))
    }

    pub fn list_tags(&self) -> Result<Vec<(String, usize)>> {
        self.db.with(|conn| SqliteIndexStore::new(conn).list_tags())
    }

    // ---- writes ----

    /// Create a note locally and enqueue its `CREATE`
    ///
    /// Fails only when the local write fails.
    pub fn create(&self, draft: NoteDraft) -> Result<IndexEntry> {
        let record = NoteRecord::from_draft(draft, now_millis());
        validate(&record)?;

        let (sequence, entry) = self.queue.enqueue_with(&record.id, |conn| {
            let entry = SqliteIndexStore::new(conn).put_record(
                &record,
                SyncStatus::Pending,
                WriteMode::Local,
            )?;
            Ok((OperationPayload::Create(stamped(record.clone(), &entry)), entry))
        })?;

        tracing::info!(note_id = %entry.id, sequence, "Created note");
        self.queue.publish(SyncEvent::IndexChanged { id: entry.id });
        Ok(entry)
    }

    /// Apply `patch` locally and enqueue an `UPDATE` carrying the full record
    ///
    /// An entry already being transmitted stays `syncing`; a failed entry is
    /// re-armed and becomes `pending` again.
    pub fn update(&self, id: &NoteId, patch: NotePatch) -> Result<IndexEntry> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }

        let (sequence, entry) = self.queue.enqueue_with(id, |conn| {
            let store = SqliteIndexStore::new(conn);
            let current = store
                .get(id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let mut record = store
                .record(id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            record.apply(patch);
            validate(&record)?;

            let status = match current.sync_status {
                SyncStatus::Syncing => SyncStatus::Syncing,
                SyncStatus::Failed => {
                    rearm(conn, id)?;
                    SyncStatus::Pending
                }
                SyncStatus::Pending | SyncStatus::Synced => SyncStatus::Pending,
            };
            let entry = store.put_record(&record, status, WriteMode::Local)?;
            Ok((OperationPayload::Update(stamped(record, &entry)), entry))
        })?;

        tracing::info!(note_id = %id, sequence, "Updated note");
        self.queue.publish(SyncEvent::IndexChanged { id: *id });
        Ok(entry)
    }

    /// Remove a note locally and enqueue its `DELETE`.
    ///
    /// Earlier `CREATE`/`UPDATE` operations for the note are dropped in the
    /// same transaction, rejected ones included, so only the delete is sent.
    pub fn delete(&self, id: &NoteId) -> Result<()> {
        let (sequence, superseded) = self.queue.enqueue_with(id, |conn| {
            if !SqliteIndexStore::new(conn).delete(id)? {
                return Err(Error::NotFound(id.to_string()));
            }
            let log = SqliteOperationLog::new(conn);
            let superseded = log.supersede_upserts(id)?;
            log.rearm(id)?;
            Ok((OperationPayload::Delete, superseded))
        })?;

        tracing::info!(note_id = %id, sequence, superseded, "Deleted note");
        self.queue.publish(SyncEvent::IndexChanged { id: *id });
        Ok(())
    }

    // ---- sync ----

    /// Fetch the remote snapshot and merge it into the index.
    ///
    /// No local entry: stored as `synced`. Local `synced`: replaced only by a
    /// strictly newer remote record. Local with unsynced changes, or deleted
    /// locally with the delete still queued: local wins for this cycle.
    pub async fn pull(&self, filter: &RemoteFilter) -> Result<PullReport> {
        let fetched = tokio::time::timeout(self.options.request_timeout, self.remote.list(filter))
            .await
            .unwrap_or_else(|_| {
                Err(RemoteError::Transient(format!(
                    "list timed out after {}ms",
                    self.options.request_timeout.as_millis()
                )))
            });
        let records = match fetched {
            Ok(records) => records,
            Err(error) => {
                self.update_state(|state| state.last_error = Some(error.to_string()));
                return Err(error.into());
            }
        };

        let (report, changed) = self.db.transaction(|conn| merge_snapshot(conn, records))?;
        self.update_state(|state| state.last_pull_at = Some(now_millis()));

        tracing::info!(
            fetched = report.fetched,
            inserted = report.inserted,
            overwritten = report.overwritten,
            kept_local = report.kept_local,
            "Pull finished"
        );
        for id in changed {
            self.queue.publish(SyncEvent::IndexChanged { id });
        }
        self.queue.publish(SyncEvent::PullFinished(report));
        Ok(report)
    }

    /// Drain the queue, then pull once if the drain ran.
    ///
    /// Pull failures are logged and swallowed here.
    pub async fn drain(&self) -> Result<Option<DrainReport>> {
        let Some(report) = self.queue.drain().await? else {
            return Ok(None);
        };
        if let Some(error) = &report.last_error {
            self.update_state(|state| state.last_error = Some(error.clone()));
        }

        if let Err(error) = self.pull(&RemoteFilter::default()).await {
            if !matches!(error, Error::Remote(_)) {
                return Err(error);
            }
            tracing::error!("Pull after drain failed: {error}");
        }
        Ok(Some(report))
    }

    /// Drain and pull now, reporting both outcomes
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let drain = self.queue.drain().await?;
        if let Some(error) = drain.as_ref().and_then(|report| report.last_error.clone()) {
            self.update_state(|state| state.last_error = Some(error));
        }

        let mut report = SyncReport {
            drain,
            ..SyncReport::default()
        };
        if !self.connectivity.is_online() {
            return Ok(report);
        }
        match self.pull(&RemoteFilter::default()).await {
            Ok(pull) => report.pull = Some(pull),
            Err(Error::Remote(error)) => report.pull_error = Some(error.to_string()),
            Err(error) => return Err(error),
        }
        Ok(report)
    }

    /// Re-arm operations the remote rejected for `id` and move the entry
    /// back to `pending`. Returns how many operations were re-armed.
    pub fn retry(&self, id: &NoteId) -> Result<usize> {
        let rearmed = self.db.transaction(|conn| {
            let rearmed = rearm(conn, id)?;
            let store = SqliteIndexStore::new(conn);
            if let Some(entry) = store.get(id)? {
                if entry.sync_status == SyncStatus::Failed {
                    store.set_sync_status(id, SyncStatus::Pending)?;
                }
            }
            Ok(rearmed)
        })?;

        if rearmed > 0 {
            tracing::info!(note_id = %id, rearmed, "Retrying rejected operations");
            self.queue.publish(SyncEvent::IndexChanged { id: *id });
            self.queue.request_drain();
        }
        Ok(rearmed)
    }

    pub fn status(&self) -> Result<SyncStatusSnapshot> {
        let counts = self.queue.counts()?;
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(SyncStatusSnapshot {
            online: self.connectivity.is_online(),
            draining: self.queue.is_draining(),
            queued: counts.queued,
            rejected: counts.rejected,
            last_pull_at: state.last_pull_at,
            last_error: state.last_error.clone(),
        })
    }

    /// Operations parked after the remote refused them
    pub fn rejected(&self) -> Result<Vec<Operation>> {
        self.queue.rejected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.queue.subscribe()
    }

    pub const fn connectivity(&self) -> &ConnectivityDetector {
        &self.connectivity
    }

    pub const fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub const fn options(&self) -> SyncOptions {
        self.options
    }

    /// Signal that wakes the drain worker
    pub fn drain_signal(&self) -> Arc<Notify> {
        self.queue.drain_signal()
    }

    /// Ask the drain worker to run if online
    pub fn request_drain(&self) {
        self.queue.request_drain();
    }

    /// Start a pull on the current runtime unless one is already running
    fn spawn_pull(&self, filter: RemoteFilter) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available for background pull");
            return;
        };
        if self
            .pulling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let coordinator = self.clone();
        handle.spawn(async move {
            if let Err(error) = coordinator.pull(&filter).await {
                tracing::error!("Background pull failed: {error}");
            }
            coordinator.pulling.store(false, Ordering::Release);
        });
    }

    fn update_state(&self, f: impl FnOnce(&mut SyncState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

impl<R> std::fmt::Debug for SyncCoordinator<R> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncCoordinator")
            .field("connectivity", &self.connectivity)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn validate(record: &NoteRecord) -> Result<()> {
    if record.title.is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    Ok(())
}

/// Carry the timestamps the index assigned into the outgoing record
fn stamped(mut record: NoteRecord, entry: &IndexEntry) -> NoteRecord {
    record.created_at = entry.created_at;
    record.updated_at = entry.updated_at;
    record
}

fn rearm(conn: &Connection, id: &NoteId) -> Result<usize> {
    SqliteOperationLog::new(conn).rearm(id)
}

/// Apply the merge rule to every remote record. Returns the ids whose local
/// entry changed.
fn merge_snapshot(conn: &Connection, records: Vec<NoteRecord>) -> Result<(PullReport, Vec<NoteId>)> {
    let store = SqliteIndexStore::new(conn);
    let log = SqliteOperationLog::new(conn);
    let mut report = PullReport {
        fetched: records.len(),
        ..PullReport::default()
    };
    let mut changed = Vec::new();

    for record in records {
        let local = store.get(&record.id)?;
        let pending_delete = log.has_pending_delete(&record.id)?;
        match merge::decide(local.as_ref(), &record, pending_delete) {
            decision @ (MergeDecision::Insert | MergeDecision::Overwrite) => {
                store.put_record(&record, SyncStatus::Synced, WriteMode::Replay)?;
                if decision == MergeDecision::Insert {
                    report.inserted += 1;
                } else {
                    report.overwritten += 1;
                }
                changed.push(record.id);
            }
            MergeDecision::KeepLocal => {
                tracing::debug!(note_id = %record.id, "Keeping local changes over remote record");
                report.kept_local += 1;
            }
            MergeDecision::Unchanged => report.unchanged += 1,
        }
    }
    Ok((report, changed))
}
