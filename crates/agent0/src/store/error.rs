//! Chat store error types.

use thiserror::Error;

/// Result type for chat store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during chat store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced chat does not exist.
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    /// IO error from the local backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error from the local backend.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error from the sqlite backend.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error from the sqlite backend.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ChatNotFound("chat-123".to_string());
        assert_eq!(err.to_string(), "chat not found: chat-123");

        let err = StoreError::Corrupt("bad timestamp".to_string());
        assert_eq!(err.to_string(), "corrupt record: bad timestamp");
    }
}
