//! Durable sync operation log

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{NoteId, Operation, OperationKind, OperationPayload, OperationState};
use crate::util::now_millis;
use rusqlite::{params, Connection};

/// Operation counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub queued: usize,
    pub rejected: usize,
}

/// Trait for durable operation log storage
pub trait OperationLog {
    /// Append an operation, assigning the next sequence
    fn append(&self, target_id: &NoteId, payload: &OperationPayload) -> Result<Operation>;

    /// Queued (not rejected) operations with a sequence above `after`, ascending
    fn queued_after(&self, after: i64) -> Result<Vec<Operation>>;

    /// Every operation in the log, ascending
    fn all(&self) -> Result<Vec<Operation>>;

    /// Operations the remote rejected, ascending
    fn rejected(&self) -> Result<Vec<Operation>>;

    /// Remove a transmitted operation
    fn remove(&self, sequence: i64) -> Result<()>;

    /// Count a failed attempt; the operation stays queued
    fn record_failure(&self, sequence: i64, error: &str) -> Result<()>;

    /// Count a failed attempt and park the operation as rejected
    fn mark_rejected(&self, sequence: i64, error: &str) -> Result<()>;

    /// Drop every CREATE or UPDATE for `target_id`, in any state
    fn supersede_upserts(&self, target_id: &NoteId) -> Result<usize>;

    /// Move rejected operations for `target_id` back to queued
    fn rearm(&self, target_id: &NoteId) -> Result<usize>;

    /// Number of operations (any state) still referencing `target_id`
    fn outstanding_for(&self, target_id: &NoteId) -> Result<usize>;

    /// Whether a delete for `target_id` is waiting to be transmitted
    fn has_pending_delete(&self, target_id: &NoteId) -> Result<bool>;

    /// Targets that have a rejected operation blocking later ones
    fn blocked_targets(&self) -> Result<HashSet<NoteId>>;

    /// Operation counts by state
    fn counts(&self) -> Result<QueueCounts>;
}

/// `SQLite` implementation of `OperationLog`
pub struct SqliteOperationLog<'a> {
    conn: &'a Connection,
}

const SELECT_OPERATION: &str = "SELECT sequence, kind, target_id, payload, enqueued_at,
        attempt_count, state, last_error
     FROM sync_queue";

/// Raw queue row before payload decoding
struct OperationRow {
    sequence: i64,
    kind: String,
    target_id: String,
    payload: String,
    enqueued_at: i64,
    attempt_count: u32,
    state: String,
    last_error: Option<String>,
}

impl OperationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence: row.get(0)?,
            kind: row.get(1)?,
            target_id: row.get(2)?,
            payload: row.get(3)?,
            enqueued_at: row.get(4)?,
            attempt_count: row.get(5)?,
            state: row.get(6)?,
            last_error: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Operation> {
        let kind: OperationKind = self.kind.parse().map_err(Error::Database)?;
        let payload: OperationPayload = serde_json::from_str(&self.payload)?;
        if payload.kind() != kind {
            return Err(Error::Database(format!(
                "operation {} is stored as {kind} but carries a {} payload",
                self.sequence,
                payload.kind()
            )));
        }

        Ok(Operation {
            sequence: self.sequence,
            target_id: self
                .target_id
                .parse()
                .map_err(|_| Error::Database(format!("invalid target id: {}", self.target_id)))?,
            payload,
            enqueued_at: self.enqueued_at,
            attempt_count: self.attempt_count,
            state: self.state.parse().map_err(Error::Database)?,
            last_error: self.last_error,
        })
    }
}

impl<'a> SqliteOperationLog<'a> {
    /// Create a new log with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Rows that no longer decode are parked as rejected and left out
    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Operation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, OperationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in rows {
            let sequence = row.sequence;
            match row.decode() {
                Ok(operation) => operations.push(operation),
                Err(error) => {
                    tracing::error!(sequence, "Skipping undecodable queued operation: {error}");
                    self.park_undecodable(sequence, &error.to_string())?;
                }
            }
        }
        Ok(operations)
    }

    fn park_undecodable(&self, sequence: i64, error: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET state = 'rejected', last_error = ?
             WHERE sequence = ? AND state != 'rejected'",
            params![format!("undecodable: {error}"), sequence],
        )?;
        Ok(())
    }

    fn bump_attempt(&self, sequence: i64, state: OperationState, error: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET attempt_count = attempt_count + 1, state = ?, last_error = ?
             WHERE sequence = ?",
            params![state.as_str(), error, sequence],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("operation {sequence}")));
        }
        Ok(())
    }
}

impl OperationLog for SqliteOperationLog<'_> {
    fn append(&self, target_id: &NoteId, payload: &OperationPayload) -> Result<Operation> {
        let enqueued_at = now_millis();
        let kind = payload.kind();
        self.conn.execute(
            "INSERT INTO sync_queue (kind, target_id, payload, enqueued_at) VALUES (?, ?, ?, ?)",
            params![
                kind.as_str(),
                target_id.as_str(),
                serde_json::to_string(payload)?,
                enqueued_at
            ],
        )?;

        Ok(Operation {
            sequence: self.conn.last_insert_rowid(),
            target_id: *target_id,
            payload: payload.clone(),
            enqueued_at,
            attempt_count: 0,
            state: OperationState::Queued,
            last_error: None,
        })
    }

    fn queued_after(&self, after: i64) -> Result<Vec<Operation>> {
        self.query(
            &format!("{SELECT_OPERATION} WHERE state = 'queued' AND sequence > ? ORDER BY sequence ASC"),
            params![after],
        )
    }

    fn all(&self) -> Result<Vec<Operation>> {
        self.query(&format!("{SELECT_OPERATION} ORDER BY sequence ASC"), [])
    }

    fn rejected(&self) -> Result<Vec<Operation>> {
        self.query(
            &format!("{SELECT_OPERATION} WHERE state = 'rejected' ORDER BY sequence ASC"),
            [],
        )
    }

    fn remove(&self, sequence: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sync_queue WHERE sequence = ?",
            params![sequence],
        )?;
        Ok(())
    }

    fn record_failure(&self, sequence: i64, error: &str) -> Result<()> {
        self.bump_attempt(sequence, OperationState::Queued, error)
    }

    fn mark_rejected(&self, sequence: i64, error: &str) -> Result<()> {
        self.bump_attempt(sequence, OperationState::Rejected, error)
    }

    fn supersede_upserts(&self, target_id: &NoteId) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE target_id = ? AND kind IN ('CREATE', 'UPDATE')",
            params![target_id.as_str()],
        )?;
        Ok(rows)
    }

    fn rearm(&self, target_id: &NoteId) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET state = 'queued' WHERE target_id = ? AND state = 'rejected'",
            params![target_id.as_str()],
        )?;
        Ok(rows)
    }

    fn outstanding_for(&self, target_id: &NoteId) -> Result<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE target_id = ?",
            params![target_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn has_pending_delete(&self, target_id: &NoteId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_queue WHERE target_id = ? AND kind = 'DELETE')",
            params![target_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn blocked_targets(&self) -> Result<HashSet<NoteId>> {
        Ok(self
            .rejected()?
            .into_iter()
            .map(|operation| operation.target_id)
            .collect())
    }

    fn counts(&self) -> Result<QueueCounts> {
        let (queued, rejected) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN state = 'queued' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN state = 'rejected' THEN 1 ELSE 0 END), 0)
             FROM sync_queue",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(QueueCounts { queued, rejected })
    }
}
