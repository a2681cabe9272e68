use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by progress store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A persisted row holds a value the domain model cannot represent.
    #[error("Corrupt progress record {name}: {message}")]
    Corrupt { name: String, message: String },
}

impl StoreError {
    pub fn corrupt(name: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for progress store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_error_names_the_record() {
        let err = StoreError::corrupt("order_history", "negative processed_orders");
        let msg = err.to_string();
        assert!(msg.contains("order_history"));
        assert!(msg.contains("negative processed_orders"));
    }

    #[test]
    fn database_error_converts() {
        let err: StoreError = DbErr::Custom("locked".to_string()).into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
