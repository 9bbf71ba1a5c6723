//! Session and database error types

/// Result of a session store operation
pub type SessionResult<T> = Result<T, SessionError>;

/// Result of a document database operation
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors returned by session store operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session document does not exist
    #[error("Session not found")]
    NotFound,

    /// Error reported by the document database, passed through unchanged
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Session data could not be converted to or from a document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store does not implement this optional operation
    #[error("{0} not implemented")]
    Unsupported(&'static str),
}

impl SessionError {
    /// True for a missing session, whether detected by the store or reported
    /// by the database (e.g. deleting a document that does not exist).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::NotFound | SessionError::Database(DatabaseError::NotFound { .. })
        )
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Errors raised by a document database backend
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The addressed document does not exist
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Collection name or document ID is not a valid path segment
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// A stored value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A merge write kept racing with concurrent writers and gave up
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Redis error (when redis-backend feature is enabled)
    #[cfg(feature = "redis-backend")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// MongoDB error (when mongodb-backend feature is enabled)
    #[cfg(feature = "mongodb-backend")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

impl DatabaseError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        DatabaseError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        assert_eq!(SessionError::NotFound.to_string(), "Session not found");
    }

    #[test]
    fn test_is_not_found_covers_database_errors() {
        assert!(SessionError::NotFound.is_not_found());
        assert!(SessionError::from(DatabaseError::not_found("sessions", "abc")).is_not_found());
        assert!(!SessionError::from(DatabaseError::InvalidPath("a/b".into())).is_not_found());
        assert!(!SessionError::Unsupported("clear").is_not_found());
    }

    #[test]
    fn test_database_error_is_transparent() {
        let err = SessionError::from(DatabaseError::InvalidPath("a/b".into()));
        assert_eq!(err.to_string(), "Invalid document path: a/b");
    }
}
