use std::time::Duration;

use thiserror::Error;

/// Errors returned by the ingestion endpoint or on the way to it.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The endpoint refused the batch (4xx). Retrying will not help.
    #[error("ingestion rejected batch (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The endpoint failed (5xx).
    #[error("ingestion server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("ingestion transport error: {message}")]
    Transport { message: String },

    #[error("ingestion request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("could not decode ingestion response: {message}")]
    Decode { message: String },

    #[error("could not encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid ingestion endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

impl IngestionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        if (400..500).contains(&status) {
            Self::Rejected { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    /// Server errors, transport failures and timeouts are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Transport { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let rejected = IngestionError::from_status(422, "bad".to_string());
        assert!(matches!(rejected, IngestionError::Rejected { status: 422, .. }));
        assert!(!rejected.is_transient());

        let server = IngestionError::from_status(503, "down".to_string());
        assert!(matches!(server, IngestionError::Server { status: 503, .. }));
        assert!(server.is_transient());
    }

    #[test]
    fn transport_and_timeout_are_transient() {
        assert!(IngestionError::transport("reset").is_transient());
        assert!(
            IngestionError::Timeout {
                after: Duration::from_secs(30)
            }
            .is_transient()
        );
        assert!(
            !IngestionError::Decode {
                message: "eof".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn timeout_message_includes_duration() {
        let err = IngestionError::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "ingestion request timed out after 30s");
    }
}
