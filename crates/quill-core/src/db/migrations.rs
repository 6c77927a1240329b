//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply a list of statements atomically
fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: local note index
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Note summaries
            "CREATE TABLE IF NOT EXISTS index_entries (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                preview TEXT NOT NULL DEFAULT '',
                collection_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE INDEX IF NOT EXISTS idx_index_entries_updated ON index_entries(updated_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_index_entries_collection ON index_entries(collection_id)",
            "CREATE INDEX IF NOT EXISTS idx_index_entries_status ON index_entries(sync_status)",
            // Full bodies, kept apart from the summaries
            "CREATE TABLE IF NOT EXISTS note_bodies (
                entry_id TEXT PRIMARY KEY REFERENCES index_entries(id) ON DELETE CASCADE,
                body TEXT NOT NULL
            )",
            // Entry-tag junction table
            "CREATE TABLE IF NOT EXISTS entry_tags (
                entry_id TEXT NOT NULL REFERENCES index_entries(id) ON DELETE CASCADE,
                tag TEXT NOT NULL,
                PRIMARY KEY (entry_id, tag)
            )",
            "CREATE INDEX IF NOT EXISTS idx_entry_tags_tag ON entry_tags(tag)",
        ],
    )
}

/// Migration to version 2: durable sync queue
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            // AUTOINCREMENT so a sequence is never handed out twice, even
            // after the tail of the queue has been drained
            "CREATE TABLE IF NOT EXISTS sync_queue (
                sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                target_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL DEFAULT 'queued',
                last_error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_target ON sync_queue(target_id, sequence)",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_state ON sync_queue(state, sequence)",
        ],
    )
}
