//! quill-core - Core library for Quill
//!
//! This crate contains the local-first note engine used by the Quill
//! interfaces: the note models, the `SQLite` index and operation queue,
//! connectivity tracking, the remote notes client and the sync coordinator.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;
mod util;

pub use config::EngineConfig;
pub use connectivity::{ConnectivityDetector, ConnectivityEvent};
pub use error::{Error, Result};
pub use models::{IndexEntry, NoteDraft, NoteId, NotePatch, NoteRecord, SyncStatus};
pub use remote::{HttpNoteRemote, RemoteError, RemoteFilter, RemoteNotes};
pub use sync::{SyncCoordinator, SyncEvent, SyncOptions, SyncScheduler};
