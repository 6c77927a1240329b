//! Local index store implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::models::{IndexEntry, NoteId, NoteRecord, SyncStatus};
use crate::util::now_millis;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// How a write treats timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// A local mutation: `updated_at` is stamped with local time
    Local,
    /// Replaying a remote snapshot: timestamps are kept verbatim
    Replay,
}

/// Ordering for [`IndexStore::list`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    UpdatedDesc,
    UpdatedAsc,
    CreatedDesc,
    TitleAsc,
}

impl SortOrder {
    const fn order_by(self) -> &'static str {
        match self {
            Self::UpdatedDesc => "e.updated_at DESC, e.id DESC",
            Self::UpdatedAsc => "e.updated_at ASC, e.id ASC",
            Self::CreatedDesc => "e.created_at DESC, e.id DESC",
            Self::TitleAsc => "e.title COLLATE NOCASE ASC, e.id ASC",
        }
    }
}

/// Filter for [`IndexStore::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub tag: Option<String>,
    pub collection_id: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListFilter {
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: Some(collection_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Trait for local index operations
///
/// All calls are synchronous and never touch the network.
pub trait IndexStore {
    /// Insert or replace a summary, keeping any stored body
    fn put(&self, entry: &IndexEntry, mode: WriteMode) -> Result<IndexEntry>;

    /// Insert or replace a summary together with its body
    fn put_record(
        &self,
        record: &NoteRecord,
        status: SyncStatus,
        mode: WriteMode,
    ) -> Result<IndexEntry>;

    /// Get a summary by ID
    fn get(&self, id: &NoteId) -> Result<Option<IndexEntry>>;

    /// Get the full document by ID
    fn record(&self, id: &NoteId) -> Result<Option<NoteRecord>>;

    /// Up to `limit` IDs starting with `prefix`, ascending
    fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<NoteId>>;

    /// Remove an entry. Returns `false` when it did not exist.
    fn delete(&self, id: &NoteId) -> Result<bool>;

    /// List entries matching `filter`
    fn list(&self, filter: &ListFilter, sort: SortOrder) -> Result<Vec<IndexEntry>>;

    /// Case-insensitive substring search over title, preview and tags
    fn search(&self, query: &str) -> Result<Vec<IndexEntry>>;

    /// Move an entry along the sync state machine without touching timestamps
    fn set_sync_status(&self, id: &NoteId, status: SyncStatus) -> Result<IndexEntry>;

    /// Get all tags with entry counts
    fn list_tags(&self) -> Result<Vec<(String, usize)>>;
}

/// `SQLite` implementation of `IndexStore`
pub struct SqliteIndexStore<'a> {
    conn: &'a Connection,
}

const SELECT_ENTRY: &str = "SELECT e.id, e.title, e.preview, e.collection_id, e.created_at,
        e.updated_at, e.sync_status,
        (SELECT group_concat(t.tag, ',') FROM entry_tags t WHERE t.entry_id = e.id)
     FROM index_entries e";

impl<'a> SqliteIndexStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Resolve timestamps for a write according to `mode`
    fn stamp(&self, entry: &mut IndexEntry, mode: WriteMode) -> Result<()> {
        if mode == WriteMode::Replay {
            return Ok(());
        }

        let existing: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT created_at, updated_at FROM index_entries WHERE id = ?",
                params![entry.id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let now = now_millis();
        match existing {
            Some((created_at, updated_at)) => {
                entry.created_at = created_at;
                // Local clocks can step backwards; never let updated_at regress
                entry.updated_at = now.max(updated_at);
            }
            None => {
                entry.updated_at = now.max(entry.updated_at);
                if entry.created_at <= 0 || entry.created_at > entry.updated_at {
                    entry.created_at = entry.updated_at;
                }
            }
        }
        Ok(())
    }

    fn write_entry(&self, entry: &IndexEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO index_entries
                (id, title, preview, collection_id, created_at, updated_at, sync_status)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                preview = excluded.preview,
                collection_id = excluded.collection_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                sync_status = excluded.sync_status",
            params![
                entry.id.as_str(),
                entry.title,
                entry.preview,
                entry.collection_id,
                entry.created_at,
                entry.updated_at,
                entry.sync_status.as_str(),
            ],
        )?;
        self.write_tags(&entry.id, &entry.tags)
    }

    /// Replace the tag links for an entry
    fn write_tags(&self, id: &NoteId, tags: &BTreeSet<String>) -> Result<()> {
        self.conn.execute(
            "DELETE FROM entry_tags WHERE entry_id = ?",
            params![id.as_str()],
        )?;

        for tag in tags {
            self.conn.execute(
                "INSERT OR IGNORE INTO entry_tags (entry_id, tag) VALUES (?, ?)",
                params![id.as_str(), tag],
            )?;
        }
        Ok(())
    }

    /// Run `f` in a savepoint so multi-table writes land together
    fn atomically<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT index_write")?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch("RELEASE index_write")?;
                Ok(value)
            }
            Err(error) => {
                self.conn
                    .execute_batch("ROLLBACK TO index_write; RELEASE index_write")
                    .ok();
                Err(error)
            }
        }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexEntry> {
        let id: String = row.get(0)?;
        let status: String = row.get(6)?;
        let tags: Option<String> = row.get(7)?;
        Ok(IndexEntry {
            id: id.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })?,
            title: row.get(1)?,
            preview: row.get(2)?,
            collection_id: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            sync_status: status.parse().map_err(|error: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    error.into(),
                )
            })?,
            tags: tags
                .unwrap_or_default()
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

impl IndexStore for SqliteIndexStore<'_> {
    fn put(&self, entry: &IndexEntry, mode: WriteMode) -> Result<IndexEntry> {
        let mut entry = entry.clone();
        self.atomically(|| {
            self.stamp(&mut entry, mode)?;
            self.write_entry(&entry)
        })?;
        Ok(entry)
    }

    fn put_record(
        &self,
        record: &NoteRecord,
        status: SyncStatus,
        mode: WriteMode,
    ) -> Result<IndexEntry> {
        let mut entry = IndexEntry::from_record(record, status);
        self.atomically(|| {
            self.stamp(&mut entry, mode)?;
            self.write_entry(&entry)?;
            self.conn.execute(
                "INSERT INTO note_bodies (entry_id, body) VALUES (?, ?)
                 ON CONFLICT(entry_id) DO UPDATE SET body = excluded.body",
                params![record.id.as_str(), record.body],
            )?;
            Ok(())
        })?;
        Ok(entry)
    }

    fn get(&self, id: &NoteId) -> Result<Option<IndexEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_ENTRY} WHERE e.id = ?"),
                params![id.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn record(&self, id: &NoteId) -> Result<Option<NoteRecord>> {
        let Some(entry) = self.get(id)? else {
            return Ok(None);
        };

        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM note_bodies WHERE entry_id = ?",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Some(NoteRecord {
            id: entry.id,
            title: entry.title,
            body: body.unwrap_or_default(),
            tags: entry.tags,
            collection_id: entry.collection_id,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }))
    }

    fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<NoteId>> {
        let pattern = prefix
            .to_ascii_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let mut stmt = self.conn.prepare(
            "SELECT id FROM index_entries WHERE id LIKE ? || '%' ESCAPE '\\' ORDER BY id LIMIT ?",
        )?;
        let ids = stmt
            .query_map(params![pattern, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        ids.into_iter()
            .map(|id| {
                id.parse()
                    .map_err(|_| Error::Database(format!("invalid entry id: {id}")))
            })
            .collect()
    }

    fn delete(&self, id: &NoteId) -> Result<bool> {
        // Bodies and tag links cascade
        let rows = self.conn.execute(
            "DELETE FROM index_entries WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn list(&self, filter: &ListFilter, sort: SortOrder) -> Result<Vec<IndexEntry>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(tag) = filter.tag.as_deref() {
            clauses.push(
                "EXISTS (SELECT 1 FROM entry_tags t WHERE t.entry_id = e.id AND t.tag = ?)",
            );
            values.push(Value::Text(
                tag.trim().trim_start_matches('#').to_lowercase(),
            ));
        }
        if let Some(collection_id) = filter.collection_id.as_deref() {
            clauses.push("e.collection_id = ?");
            values.push(Value::Text(collection_id.trim().to_string()));
        }
        if let Some(status) = filter.sync_status {
            clauses.push("e.sync_status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        // A negative LIMIT means no limit in SQLite
        values.push(Value::Integer(filter.limit.map_or(-1, |limit| limit as i64)));
        values.push(Value::Integer(filter.offset as i64));

        let sql = format!(
            "{SELECT_ENTRY}{where_clause} ORDER BY {} LIMIT ? OFFSET ?",
            sort.order_by()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn search(&self, query: &str) -> Result<Vec<IndexEntry>> {
        let needle = query.trim().to_lowercase();
        let entries = self.list(&ListFilter::default(), SortOrder::default())?;
        if needle.is_empty() {
            return Ok(entries);
        }

        // SQLite's LIKE only folds ASCII, so match in Rust
        Ok(entries
            .into_iter()
            .filter(|entry| entry.matches(&needle))
            .collect())
    }

    fn set_sync_status(&self, id: &NoteId, status: SyncStatus) -> Result<IndexEntry> {
        let mut entry = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if entry.sync_status == status {
            return Ok(entry);
        }
        if !entry.sync_status.can_transition_to(status) {
            return Err(Error::InvalidInput(format!(
                "illegal sync status transition for {id}: {} -> {status}",
                entry.sync_status
            )));
        }

        self.conn.execute(
            "UPDATE index_entries SET sync_status = ? WHERE id = ?",
            params![status.as_str(), id.as_str()],
        )?;
        entry.sync_status = status;
        Ok(entry)
    }

    fn list_tags(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, COUNT(entry_id) as count
             FROM entry_tags
             GROUP BY tag
             ORDER BY count DESC, tag ASC",
        )?;

        let tags = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NoteDraft;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn record(title: &str, body: &str, tags: &[&str]) -> NoteRecord {
        NoteRecord::from_draft(
            NoteDraft::new(title)
                .with_body(body)
                .with_tags(tags.iter().copied()),
            now_millis(),
        )
    }

    #[test]
    fn test_put_record_and_get() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let note = record("Hello", "World body", &["rust"]);
        let stored = store
            .put_record(&note, SyncStatus::Pending, WriteMode::Local)
            .unwrap();

        let fetched = store.get(&note.id).unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.preview, "World body");
        assert!(fetched.tags.contains("rust"));

        let full = store.record(&note.id).unwrap().unwrap();
        assert_eq!(full.body, "World body");
    }

    #[test]
    fn test_get_missing() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());
        assert!(store.get(&NoteId::new()).unwrap().is_none());
        assert!(store.record(&NoteId::new()).unwrap().is_none());
    }

    #[test]
    fn test_local_write_is_monotonic() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let mut note = record("Future", "", &[]);
        let future = now_millis() + 60_000;
        note.updated_at = future;
        note.created_at = future;
        store
            .put_record(&note, SyncStatus::Synced, WriteMode::Replay)
            .unwrap();

        let mut entry = store.get(&note.id).unwrap().unwrap();
        entry.title = "Edited".to_string();
        entry.sync_status = SyncStatus::Pending;
        let stored = store.put(&entry, WriteMode::Local).unwrap();

        assert!(stored.updated_at >= future);
        assert_eq!(stored.created_at, future);
    }

    #[test]
    fn test_replay_keeps_remote_timestamps() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let mut note = record("Remote", "", &[]);
        note.created_at = 10;
        note.updated_at = 20;
        let stored = store
            .put_record(&note, SyncStatus::Synced, WriteMode::Replay)
            .unwrap();

        assert_eq!(stored.created_at, 10);
        assert_eq!(stored.updated_at, 20);
    }

    #[test]
    fn test_put_keeps_body() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let note = record("Title", "Body text", &[]);
        let mut entry = store
            .put_record(&note, SyncStatus::Pending, WriteMode::Local)
            .unwrap();
        entry.title = "Renamed".to_string();
        store.put(&entry, WriteMode::Local).unwrap();

        let full = store.record(&note.id).unwrap().unwrap();
        assert_eq!(full.title, "Renamed");
        assert_eq!(full.body, "Body text");
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let note = record("To delete", "body", &["gone"]);
        store
            .put_record(&note, SyncStatus::Pending, WriteMode::Local)
            .unwrap();

        assert!(store.delete(&note.id).unwrap());
        assert!(!store.delete(&note.id).unwrap());
        assert!(store.get(&note.id).unwrap().is_none());
        assert!(store.list_tags().unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let mut a = record("Banana", "", &["fruit"]);
        a.collection_id = Some("kitchen".to_string());
        a.updated_at = 100;
        let mut b = record("apple", "", &["fruit", "red"]);
        b.updated_at = 300;
        let mut c = record("Carrot", "", &["vegetable"]);
        c.collection_id = Some("kitchen".to_string());
        c.updated_at = 200;
        for note in [&a, &b, &c] {
            store
                .put_record(note, SyncStatus::Synced, WriteMode::Replay)
                .unwrap();
        }

        let all = store
            .list(&ListFilter::default(), SortOrder::UpdatedDesc)
            .unwrap();
        let ids: Vec<_> = all.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);

        let by_title = store.list(&ListFilter::default(), SortOrder::TitleAsc).unwrap();
        let titles: Vec<_> = by_title.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["apple", "Banana", "Carrot"]);

        let fruit = store
            .list(&ListFilter::tag("#Fruit"), SortOrder::UpdatedAsc)
            .unwrap();
        assert_eq!(fruit.len(), 2);
        assert_eq!(fruit[0].id, a.id);

        let kitchen = store
            .list(&ListFilter::collection("kitchen"), SortOrder::default())
            .unwrap();
        assert_eq!(kitchen.len(), 2);

        let limited = store
            .list(&ListFilter::default().with_limit(1), SortOrder::default())
            .unwrap();
        assert_eq!(limited.len(), 1);

        let pending = store
            .list(
                &ListFilter {
                    sync_status: Some(SyncStatus::Pending),
                    ..ListFilter::default()
                },
                SortOrder::default(),
            )
            .unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        for note in [
            record("Hello World", "", &[]),
            record("Shopping", "buy WORLD map", &[]),
            record("Trip", "", &["worldwide"]),
            record("Something else", "", &[]),
        ] {
            store
                .put_record(&note, SyncStatus::Pending, WriteMode::Local)
                .unwrap();
        }

        assert_eq!(store.search("world").unwrap().len(), 3);
        assert_eq!(store.search("  ").unwrap().len(), 4);
        assert!(store.search("missing").unwrap().is_empty());
    }

    #[test]
    fn test_set_sync_status_enforces_transitions() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let note = record("Status", "", &[]);
        let stored = store
            .put_record(&note, SyncStatus::Pending, WriteMode::Local)
            .unwrap();

        let err = store.set_sync_status(&note.id, SyncStatus::Synced).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let syncing = store.set_sync_status(&note.id, SyncStatus::Syncing).unwrap();
        assert_eq!(syncing.updated_at, stored.updated_at);
        let synced = store.set_sync_status(&note.id, SyncStatus::Synced).unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);

        let missing = store
            .set_sync_status(&NoteId::new(), SyncStatus::Syncing)
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[test]
    fn test_list_tags() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        for note in [
            record("One", "", &["rust", "programming"]),
            record("Two", "", &["rust"]),
        ] {
            store
                .put_record(&note, SyncStatus::Pending, WriteMode::Local)
                .unwrap();
        }

        let tags = store.list_tags().unwrap();
        assert_eq!(
            tags,
            vec![("rust".to_string(), 2), ("programming".to_string(), 1)]
        );
    }

    #[test]
    fn test_ids_with_prefix_is_bounded() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());

        let notes: Vec<_> = (0..4).map(|i| record(&format!("n{i}"), "", &[])).collect();
        for note in &notes {
            store
                .put_record(note, SyncStatus::Pending, WriteMode::Local)
                .unwrap();
        }
        let mut all: Vec<_> = notes.iter().map(|note| note.id).collect();
        all.sort();

        assert_eq!(store.ids_with_prefix("", 3).unwrap(), all[..3].to_vec());

        let full = all[1].to_string();
        assert_eq!(
            store.ids_with_prefix(&full.to_uppercase(), 3).unwrap(),
            vec![all[1]]
        );
        assert!(store.ids_with_prefix("zz", 3).unwrap().is_empty());
        assert!(store.ids_with_prefix("%", 3).unwrap().is_empty());
        assert!(store.ids_with_prefix("_", 3).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_sync_status_is_a_read_error() {
        let db = setup();
        let store = SqliteIndexStore::new(db.connection());
        let note = record("Corrupt", "", &[]);
        store
            .put_record(&note, SyncStatus::Synced, WriteMode::Local)
            .unwrap();

        db.connection()
            .execute(
                "UPDATE index_entries SET sync_status = 'bogus' WHERE id = ?",
                params![note.id.as_str()],
            )
            .unwrap();

        assert!(store.get(&note.id).is_err());
        assert!(store.list(&ListFilter::default(), SortOrder::default()).is_err());
    }
}
