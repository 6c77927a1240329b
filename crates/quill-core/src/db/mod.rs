//! Database layer for Quill

mod connection;
mod index_store;
mod migrations;
mod queue_store;

pub use connection::{Database, SharedDatabase};
pub use index_store::{IndexStore, ListFilter, SortOrder, SqliteIndexStore, WriteMode};
pub use queue_store::{OperationLog, QueueCounts, SqliteOperationLog};
