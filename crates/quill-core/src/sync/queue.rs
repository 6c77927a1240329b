//! Durable operation queue and drain loop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{broadcast, Notify};

use super::events::{DrainReport, SyncEvent};
use crate::connectivity::ConnectivityDetector;
use crate::db::{IndexStore, OperationLog, QueueCounts, SharedDatabase, SqliteIndexStore, SqliteOperationLog};
use crate::error::{Error, Result};
use crate::models::{NoteId, Operation, OperationPayload, SyncStatus};
use crate::remote::{RemoteError, RemoteNotes, RemoteResult};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Resets the drain flag when the drain ends, including on early return
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Ordered log of pending mutations and the loop that transmits them
///
/// Cloning yields another handle to the same queue.
pub struct SyncQueue<R> {
    db: SharedDatabase,
    remote: Arc<R>,
    connectivity: ConnectivityDetector,
    drain_signal: Arc<Notify>,
    draining: Arc<AtomicBool>,
    request_timeout: Duration,
    events: broadcast::Sender<SyncEvent>,
}

impl<R> Clone for SyncQueue<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            remote: Arc::clone(&self.remote),
            connectivity: self.connectivity.clone(),
            drain_signal: Arc::clone(&self.drain_signal),
            draining: Arc::clone(&self.draining),
            request_timeout: self.request_timeout,
            events: self.events.clone(),
        }
    }
}

impl<R: RemoteNotes> SyncQueue<R> {
    pub fn new(
        db: SharedDatabase,
        remote: Arc<R>,
        connectivity: ConnectivityDetector,
        request_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            remote,
            connectivity,
            drain_signal: Arc::new(Notify::new()),
            draining: Arc::new(AtomicBool::new(false)),
            request_timeout,
            events,
        }
    }

    /// Append an operation durably and request a drain when online
    pub fn enqueue(&self, target_id: &NoteId, payload: OperationPayload) -> Result<i64> {
        let (sequence, ()) = self.enqueue_with(target_id, |_| Ok((payload, ())))?;
        Ok(sequence)
    }

    /// Run a local write and append the operation it produces in one
    /// transaction, then request a drain when online
    ///
    /// Either both the local change and the operation are stored or neither is.
    pub fn enqueue_with<T>(
        &self,
        target_id: &NoteId,
        local: impl FnOnce(&Connection) -> Result<(OperationPayload, T)>,
    ) -> Result<(i64, T)> {
        let (operation, value) = self.db.transaction(|conn| {
            let (payload, value) = local(conn)?;
            let operation = SqliteOperationLog::new(conn).append(target_id, &payload)?;
            Ok((operation, value))
        })?;

        tracing::debug!(
            sequence = operation.sequence,
            kind = %operation.kind(),
            note_id = %target_id,
            "Enqueued operation"
        );
        self.request_drain();
        Ok((operation.sequence, value))
    }

    /// Wake the drain worker if the remote is believed reachable
    ///
    /// Repeated requests before the worker runs coalesce into one drain.
    pub fn request_drain(&self) {
        if self.connectivity.is_online() {
            self.drain_signal.notify_one();
        }
    }

    /// Signal the drain worker waits on
    pub fn drain_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.drain_signal)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn counts(&self) -> Result<QueueCounts> {
        self.db.with(|conn| SqliteOperationLog::new(conn).counts())
    }

    /// Operations parked after the remote refused them
    pub fn rejected(&self) -> Result<Vec<Operation>> {
        self.db.with(|conn| SqliteOperationLog::new(conn).rejected())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SyncEvent) {
        // No subscribers is fine
        self.events.send(event).ok();
    }

    /// Transmit queued operations in sequence order.
    ///
    /// Returns `None` without doing anything when offline or when another
    /// drain is already running. Every queued operation is attempted at most
    /// once per call. After a failure for a target, that target's later
    /// operations are held back until the next drain so they cannot overtake
    /// it.
    pub async fn drain(&self) -> Result<Option<DrainReport>> {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping drain while offline");
            return Ok(None);
        }
        let Some(guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Drain already running");
            return Ok(None);
        };

        let mut report = DrainReport::default();
        let mut held_back: HashSet<NoteId> =
            self.db.with(|conn| SqliteOperationLog::new(conn).blocked_targets())?;
        let mut high_water = 0;

        // Re-read until no operation was appended behind the last batch
        loop {
            let batch = self
                .db
                .with(|conn| SqliteOperationLog::new(conn).queued_after(high_water))?;
            if batch.is_empty() {
                break;
            }

            for operation in batch {
                high_water = operation.sequence;
                if held_back.contains(&operation.target_id) {
                    report.skipped += 1;
                    continue;
                }

                self.mark_syncing(&operation.target_id)?;
                match self.transmit(&operation).await {
                    Ok(()) => {
                        self.complete(&operation)?;
                        report.sent += 1;
                    }
                    Err(error) if error.is_transient() => {
                        let message = error.to_string();
                        tracing::warn!(
                            sequence = operation.sequence,
                            note_id = %operation.target_id,
                            attempts = operation.attempt_count + 1,
                            "Transmission failed, keeping operation queued: {message}"
                        );
                        let kept = self.db.with(|conn| {
                            still_queued(
                                SqliteOperationLog::new(conn)
                                    .record_failure(operation.sequence, &message),
                            )
                        })?;
                        if !kept {
                            tracing::debug!(
                                sequence = operation.sequence,
                                "Operation was superseded while in flight"
                            );
                            continue;
                        }
                        held_back.insert(operation.target_id);
                        report.failed += 1;
                        report.last_error = Some(message);
                    }
                    Err(error) => {
                        let message = error.to_string();
                        tracing::error!(
                            sequence = operation.sequence,
                            note_id = %operation.target_id,
                            "Remote rejected operation: {message}"
                        );
                        if !self.reject(&operation, &message)? {
                            tracing::debug!(
                                sequence = operation.sequence,
                                "Operation was superseded while in flight"
                            );
                            continue;
                        }
                        held_back.insert(operation.target_id);
                        report.rejected += 1;
                        report.last_error = Some(message);
                    }
                }
            }
        }
        drop(guard);

        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            rejected = report.rejected,
            skipped = report.skipped,
            "Drain finished"
        );
        self.publish(SyncEvent::DrainFinished(report.clone()));

        // An enqueue that raced the guard release would otherwise wait for the next trigger
        let raced = self
            .db
            .with(|conn| SqliteOperationLog::new(conn).queued_after(high_water))?;
        if !raced.is_empty() {
            self.request_drain();
        }

        Ok(Some(report))
    }

    async fn transmit(&self, operation: &Operation) -> RemoteResult<()> {
        tracing::debug!(
            sequence = operation.sequence,
            kind = %operation.kind(),
            note_id = %operation.target_id,
            "Transmitting operation"
        );

        let request = async {
            if let Some(record) = operation.payload.record() {
                return match self.remote.upsert(record).await {
                    Err(RemoteError::NotFound) => Err(RemoteError::Rejected {
                        status: 404,
                        message: "upsert target not found".to_string(),
                    }),
                    other => other,
                };
            }
            match self.remote.delete(&operation.target_id).await {
                Err(RemoteError::NotFound) => {
                    tracing::debug!(note_id = %operation.target_id, "Remote note already deleted");
                    Ok(())
                }
                other => other,
            }
        };

        tokio::time::timeout(self.request_timeout, request)
            .await
            .unwrap_or_else(|_| {
                Err(RemoteError::Transient(format!(
                    "request timed out after {}ms",
                    self.request_timeout.as_millis()
                )))
            })
    }

    /// `pending -> syncing` before the first transmission of a target
    fn mark_syncing(&self, target_id: &NoteId) -> Result<()> {
        self.db.with(|conn| {
            let store = SqliteIndexStore::new(conn);
            if let Some(entry) = store.get(target_id)? {
                if entry.sync_status == SyncStatus::Pending {
                    store.set_sync_status(target_id, SyncStatus::Syncing)?;
                }
            }
            Ok(())
        })
    }

    /// Remove a transmitted operation; the entry is synced once nothing
    /// else is outstanding for it
    fn complete(&self, operation: &Operation) -> Result<()> {
        let synced = self.db.transaction(|conn| {
            let log = SqliteOperationLog::new(conn);
            log.remove(operation.sequence)?;
            if log.outstanding_for(&operation.target_id)? > 0 {
                return Ok(false);
            }

            let store = SqliteIndexStore::new(conn);
            match store.get(&operation.target_id)? {
                Some(entry) if entry.sync_status == SyncStatus::Syncing => {
                    store.set_sync_status(&operation.target_id, SyncStatus::Synced)?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })?;

        if synced {
            self.publish(SyncEvent::IndexChanged {
                id: operation.target_id,
            });
        }
        Ok(())
    }

    /// Park a rejected operation; `false` if it is no longer in the log
    fn reject(&self, operation: &Operation, message: &str) -> Result<bool> {
        let parked = self.db.transaction(|conn| {
            let log = SqliteOperationLog::new(conn);
            if !still_queued(log.mark_rejected(operation.sequence, message))? {
                return Ok(false);
            }
            let store = SqliteIndexStore::new(conn);
            if let Some(entry) = store.get(&operation.target_id)? {
                if entry.sync_status == SyncStatus::Syncing {
                    store.set_sync_status(&operation.target_id, SyncStatus::Failed)?;
                }
            }
            Ok(true)
        })?;

        if parked {
            self.publish(SyncEvent::SyncFailed {
                id: operation.target_id,
                message: message.to_string(),
            });
        }
        Ok(parked)
    }
}

/// A local delete may drop an upsert while it is being transmitted
fn still_queued(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(Error::NotFound(_)) => Ok(false),
        Err(error) => Err(error),
    }
}
