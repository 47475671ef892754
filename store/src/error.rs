//! Store error types.

use forexsync_common::ValidationError;
use thiserror::Error;
use uuid::Uuid;

use crate::task::RecordStatus;

/// Errors raised by the rate store, the task queue and checkpoints.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record rejected before being written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend I/O failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be decoded or encoded.
    #[error("Corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },

    /// Task is not known to the queue.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// Producers may only enqueue pending statuses.
    #[error("Tasks cannot be enqueued with status {0:?}")]
    InvalidStatus(RecordStatus),
}

impl StoreError {
    pub(crate) fn corrupt(key: impl Into<String>, error: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            key: key.into(),
            message: error.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
