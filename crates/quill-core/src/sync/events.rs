//! Engine notifications published to subscribers.

use serde::Serialize;

use crate::models::NoteId;

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Transmitted and removed from the queue
    pub sent: usize,
    /// Transient failures left queued
    pub failed: usize,
    /// Refused by the remote and parked
    pub rejected: usize,
    /// Held back behind an earlier failure for the same note
    pub skipped: usize,
    /// Message of the last failed transmission
    pub last_error: Option<String>,
}

impl DrainReport {
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.rejected == 0 && self.skipped == 0
    }
}

/// Outcome of one pull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub fetched: usize,
    /// New locally
    pub inserted: usize,
    /// Local synced copy replaced by a strictly newer remote one
    pub overwritten: usize,
    /// Remote dropped because the local entry has unsynced changes
    pub kept_local: usize,
    /// Remote not newer than the local synced copy
    pub unchanged: usize,
}

impl PullReport {
    pub const fn applied(&self) -> usize {
        self.inserted + self.overwritten
    }
}

/// Notification published on the coordinator's event channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A local entry was written or removed
    IndexChanged { id: NoteId },
    DrainFinished(DrainReport),
    PullFinished(PullReport),
    /// The remote rejected an operation for `id`
    SyncFailed { id: NoteId, message: String },
}
