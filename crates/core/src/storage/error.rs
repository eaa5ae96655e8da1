//! Error types for checkpoint storage.

use thiserror::Error;

/// Errors that can occur in a storage client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The client was closed.
    #[error("Storage client is closed")]
    Closed,

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A typed value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
