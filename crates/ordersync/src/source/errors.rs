use thiserror::Error;

/// Errors that can occur while reading orders from a store.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The store rejected our credentials.
    #[error("Order source rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Non-success response from the store API.
    #[error("Order source API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Network or connection error.
    #[error("Order source network error: {message}")]
    Network { message: String },

    /// The request exceeded its timeout.
    #[error("Order source request timed out")]
    Timeout,

    /// The response could not be decoded.
    #[error("Order source returned an undecodable response: {message}")]
    Decode { message: String },

    /// The cursor does not belong to this source.
    #[error("Invalid cursor: {cursor}")]
    InvalidCursor { cursor: String },
}

impl SourceError {
    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, network failures and 5xx / 429 responses are transient.
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized { .. } | Self::Decode { .. } | Self::InvalidCursor { .. } => false,
        }
    }
}

/// Result type for order source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
