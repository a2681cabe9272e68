use thiserror::Error;

use crate::queue::QueueError;
use crate::store::StoreError;

/// Errors surfaced by orchestrator operations.
///
/// Page-level failures are not errors here: they end the run in the `error`
/// status and are reported through the progress record.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("progress store failure: {0}")]
    Store(#[from] StoreError),

    #[error("chunk queue failure: {0}")]
    Queue(#[from] QueueError),

    /// An active, non-stale run exists.
    #[error("a sync is already in progress")]
    InProgress,

    /// Other callers kept changing the run token while we tried to claim it.
    #[error("could not claim the sync run after {attempts} attempts")]
    Contended { attempts: usize },

    #[error("invalid sync configuration: {message}")]
    InvalidConfig { message: String },

    #[error("unknown run token")]
    UnknownToken,
}

impl SyncError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "store_error",
            Self::Queue(_) => "queue_error",
            Self::InProgress => "sync_in_progress",
            Self::Contended { .. } => "sync_contended",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::UnknownToken => "invalid_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SyncError::InProgress.code(), "sync_in_progress");
        assert_eq!(SyncError::Contended { attempts: 3 }.code(), "sync_contended");
        assert_eq!(SyncError::invalid_config("x").code(), "invalid_config");
        assert_eq!(
            SyncError::Store(StoreError::corrupt("order_history", "bad")).code(),
            "store_error"
        );
    }
}
