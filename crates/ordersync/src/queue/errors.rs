use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by chunk queue implementations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Chunk delay out of range: {delay:?}")]
    InvalidDelay { delay: Duration },
}

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
