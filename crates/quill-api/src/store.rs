//! In-memory authoritative note set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use quill_core::{NoteId, NoteRecord};
use serde::Serialize;
use tokio::sync::RwLock;

/// Whether an upsert created or replaced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

#[derive(Default)]
struct StoreMetrics {
    upserts: AtomicU64,
    deletes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreMetricsSnapshot {
    pub notes: usize,
    pub upserts: u64,
    pub deletes: u64,
}

#[derive(Default)]
pub struct NoteStore {
    notes: RwLock<BTreeMap<NoteId, NoteRecord>>,
    metrics: StoreMetrics,
}

impl NoteStore {
    /// Records matching the optional tag and collection, in id order
    pub async fn list(&self, tag: Option<&str>, collection_id: Option<&str>) -> Vec<NoteRecord> {
        self.notes
            .read()
            .await
            .values()
            .filter(|record| tag.is_none_or(|tag| record.tags.contains(tag)))
            .filter(|record| {
                collection_id.is_none_or(|collection| record.collection_id.as_deref() == Some(collection))
            })
            .cloned()
            .collect()
    }

    /// Store `record` as sent; its timestamps are kept verbatim
    pub async fn upsert(&self, record: NoteRecord) -> UpsertOutcome {
        self.metrics.upserts.fetch_add(1, Ordering::Relaxed);
        match self.notes.write().await.insert(record.id, record) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Created,
        }
    }

    /// Returns `false` when the record did not exist
    pub async fn delete(&self, id: &NoteId) -> bool {
        let removed = self.notes.write().await.remove(id).is_some();
        if removed {
            self.metrics.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub async fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            notes: self.notes.read().await.len(),
            upserts: self.metrics.upserts.load(Ordering::Relaxed),
            deletes: self.metrics.deletes.load(Ordering::Relaxed),
        }
    }
}
