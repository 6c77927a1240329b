//! Remote notes service contract.
//!
//! The engine talks to the authoritative server only through
//! [`RemoteNotes`]. [`HttpNoteRemote`] implements it against the notes HTTP
//! API; tests substitute an in-memory fake.

mod http;

use std::future::Future;

use thiserror::Error;

use crate::models::{NoteId, NoteRecord};

pub use http::HttpNoteRemote;

/// Transport failure taxonomy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Connectivity or timeout; the operation stays queued
    #[error("Transient network error: {0}")]
    Transient(String),
    /// The server refused the request
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The record does not exist remotely
    #[error("Remote record not found")]
    NotFound,
}

impl RemoteError {
    /// Whether retrying on the next trigger may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Filter forwarded to `GET /notes`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFilter {
    pub tag: Option<String>,
    pub collection_id: Option<String>,
}

impl RemoteFilter {
    /// Query string pairs for the non-empty filter fields
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(tag) = crate::util::normalize_text_option(self.tag.clone()) {
            pairs.push(("tag", tag));
        }
        if let Some(collection_id) = crate::util::normalize_text_option(self.collection_id.clone())
        {
            pairs.push(("collection_id", collection_id));
        }
        pairs
    }
}

impl From<&crate::db::ListFilter> for RemoteFilter {
    fn from(filter: &crate::db::ListFilter) -> Self {
        Self {
            tag: filter.tag.clone(),
            collection_id: filter.collection_id.clone(),
        }
    }
}

/// Authoritative note service
pub trait RemoteNotes: Send + Sync + 'static {
    /// `GET /notes`: current snapshot of remote records
    fn list(
        &self,
        filter: &RemoteFilter,
    ) -> impl Future<Output = RemoteResult<Vec<NoteRecord>>> + Send;

    /// `PUT /notes/{id}`: idempotent create-or-replace keyed by the record id
    fn upsert(&self, record: &NoteRecord) -> impl Future<Output = RemoteResult<()>> + Send;

    /// `DELETE /notes/{id}`: returns [`RemoteError::NotFound`] on 404
    fn delete(&self, id: &NoteId) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Cheap reachability check
    fn probe(&self) -> impl Future<Output = bool> + Send;
}
