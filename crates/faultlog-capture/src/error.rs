//! Capture error types.

use faultlog_storage::StorageError;
use thiserror::Error;

/// Errors raised while setting up a capture facility.
///
/// Capturing itself never fails; these only surface from construction.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The error store could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The traceback directory could not be prepared.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture setup.
pub type Result<T> = std::result::Result<T, CaptureError>;
