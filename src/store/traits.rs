//! Session store trait

use async_trait::async_trait;
use crate::error::SessionError;
use crate::session::SessionData;

/// Trait for session storage backends
///
/// This mirrors the store interface session middleware expects: one record
/// per session ID, read, written and destroyed independently.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by ID
    ///
    /// Returns `SessionError::NotFound` if the session doesn't exist
    async fn get(&self, sid: &str) -> Result<SessionData, SessionError>;

    /// Create or update a session
    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError>;

    /// Destroy/delete a session
    async fn destroy(&self, sid: &str) -> Result<(), SessionError>;

    /// Clear all sessions (optional)
    async fn clear(&self) -> Result<(), SessionError> {
        Err(SessionError::Unsupported("clear"))
    }

    /// Get all sessions (optional)
    async fn all(&self) -> Result<Vec<SessionData>, SessionError> {
        Err(SessionError::Unsupported("all"))
    }

    /// Get the count of all sessions (optional)
    async fn length(&self) -> Result<usize, SessionError> {
        Err(SessionError::Unsupported("length"))
    }

    /// Get all session IDs (optional)
    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        Err(SessionError::Unsupported("ids"))
    }
}
