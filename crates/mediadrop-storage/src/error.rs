//! Storage error types

use mediadrop_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to stage chunk: {0}")]
    StagingFailed(String),

    #[error("Session {0} was claimed while staging")]
    SessionClaimed(String),

    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("Missing chunk {index} for session {session}")]
    MissingChunk { session: String, index: u32 },

    #[error("Invalid path segment: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}
