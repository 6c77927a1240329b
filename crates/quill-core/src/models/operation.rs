//! Sync operation model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::note::{NoteId, NoteRecord};

/// Kind of mutation recorded in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown operation kind: {other}")),
        }
    }
}

/// Mutation body, keyed by kind
///
/// Create and update both carry the full record because they are sent as an
/// upsert by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "note", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationPayload {
    Create(NoteRecord),
    Update(NoteRecord),
    Delete,
}

impl OperationPayload {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Update(_) => OperationKind::Update,
            Self::Delete => OperationKind::Delete,
        }
    }

    /// Record to upsert, if any
    #[must_use]
    pub const fn record(&self) -> Option<&NoteRecord> {
        match self {
            Self::Create(record) | Self::Update(record) => Some(record),
            Self::Delete => None,
        }
    }
}

/// Queue state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Waiting for the next drain
    Queued,
    /// The remote refused it; held until explicitly retried
    Rejected,
}

impl OperationState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown operation state: {other}")),
        }
    }
}

/// A durable record of one intended mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Ordering key, strictly increasing and never reused
    pub sequence: i64,
    pub target_id: NoteId,
    pub payload: OperationPayload,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
    pub attempt_count: u32,
    pub state: OperationState,
    pub last_error: Option<String>,
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.payload.kind()
    }
}
