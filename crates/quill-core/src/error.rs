//! Error types for quill-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
///
/// `Database`, `Sqlite` and `Io` are local storage failures: they are
/// returned synchronously from the call that triggered them. `Remote` only
/// surfaces from explicit sync calls, never from local writes.
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote transport error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error came from the on-device store.
    pub const fn is_local_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Sqlite(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_storage_errors_are_classified() {
        assert!(Error::Database("locked".to_string()).is_local_storage());
        assert!(Error::Io(std::io::Error::other("disk full")).is_local_storage());
        assert!(!Error::NotFound("x".to_string()).is_local_storage());
        assert!(!Error::Remote(RemoteError::NotFound).is_local_storage());
    }
}
