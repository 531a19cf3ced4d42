//! Storage error types.

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from rusqlite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (e.g., creating directories).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded into a record field.
    #[error("Corrupt record {identifier}: {reason}")]
    Corrupt { identifier: String, reason: String },

    /// Connection mutex was poisoned by a panicking holder.
    #[error("Connection pool poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
