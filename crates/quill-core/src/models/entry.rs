//! Index entry model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::note::{NoteId, NoteRecord};

/// Sync state of a local entry
///
/// Owned by the coordinator. Legal moves are `pending -> syncing`,
/// `syncing -> synced | failed` and `failed -> pending`. A new local edit is
/// the only way back from `synced` to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    /// Check whether the coordinator may move an entry from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Syncing)
                | (Self::Syncing, Self::Synced | Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Local changes not yet confirmed by the remote
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        !matches!(self, Self::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// Lightweight local summary of one note, used for list rendering and search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: NoteId,
    pub title: String,
    /// Derived from the body; never authoritative
    pub preview: String,
    pub tags: BTreeSet<String>,
    pub collection_id: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

impl IndexEntry {
    /// Summarize a full record
    #[must_use]
    pub fn from_record(record: &NoteRecord, sync_status: SyncStatus) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            preview: record.preview(),
            tags: record.tags.clone(),
            collection_id: record.collection_id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            sync_status,
        }
    }

    /// Case-insensitive substring match over title, preview and tags.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.preview.to_lowercase().contains(needle)
            || self.tags.iter().any(|tag| tag.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteDraft;

    #[test]
    fn test_status_transitions() {
        use SyncStatus::{Failed, Pending, Synced, Syncing};

        assert!(Pending.can_transition_to(Syncing));
        assert!(Syncing.can_transition_to(Synced));
        assert!(Syncing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Synced.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Synced));
        assert!(!Failed.can_transition_to(Synced));
        assert!(!Synced.can_transition_to(Syncing));
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Syncing,
            SyncStatus::Synced,
            SyncStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_entry_matches() {
        let record = NoteRecord::from_draft(
            NoteDraft::new("Groceries")
                .with_body("Buy MILK and eggs")
                .with_tags(["errands"]),
            1,
        );
        let entry = IndexEntry::from_record(&record, SyncStatus::Pending);

        assert!(entry.matches("grocer"));
        assert!(entry.matches("milk"));
        assert!(entry.matches("errand"));
        assert!(!entry.matches("bread"));
    }
}
