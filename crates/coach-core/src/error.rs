//! Error types for coach-core.

use thiserror::Error;

/// Result type alias using coach-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for coaching session operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // Lookup errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Vocabulary entry not found: {0}")]
    VocabularyNotFound(String),

    // Input errors
    #[error("Invalid input: {0}")]
    Validation(String),

    // Cache / marker store errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Remote enrichment errors
    #[error("Enrichment call failed: {0}")]
    Enrichment(String),

    #[error("Enrichment call timed out after {0}ms")]
    Timeout(u64),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Blocking task errors
    #[error("Background task failed: {0}")]
    TaskJoin(String),

    #[error("Invalid token")]
    InvalidToken,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an enrichment error
    pub fn enrichment(message: impl Into<String>) -> Self {
        Self::Enrichment(message.into())
    }

    /// Whether this error means the addressed entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::VocabularyNotFound(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
