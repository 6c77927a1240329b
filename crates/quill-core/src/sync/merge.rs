//! Pull merge rule.

use crate::models::{IndexEntry, NoteRecord};

/// What a pull does with one remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local entry: store the remote record as synced
    Insert,
    /// Local entry is synced and strictly older: take the remote record
    Overwrite,
    /// Local entry has unsynced changes: local wins for this cycle
    KeepLocal,
    /// Local entry is synced and at least as new: nothing to do
    Unchanged,
}

/// Decide how to merge `remote` into the local index.
///
/// `pending_delete` is set when the note was deleted locally and the delete
/// has not been confirmed yet; such a record must not come back.
pub fn decide(
    local: Option<&IndexEntry>,
    remote: &NoteRecord,
    pending_delete: bool,
) -> MergeDecision {
    if pending_delete {
        return MergeDecision::KeepLocal;
    }

    match local {
        None => MergeDecision::Insert,
        Some(entry) if entry.sync_status.is_dirty() => MergeDecision::KeepLocal,
        Some(entry) if remote.updated_at > entry.updated_at => MergeDecision::Overwrite,
        Some(_) => MergeDecision::Unchanged,
    }
}
