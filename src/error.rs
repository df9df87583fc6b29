//! Error types for auth-session.

use thiserror::Error;

/// Failure reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Backend-internal failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend payload could not be encoded or decoded.
    #[error("storage codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for storage backends.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Main error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Attribute key was empty.
    #[error("key cannot be empty")]
    EmptyKey,

    /// Session id was empty.
    #[error("session id cannot be empty")]
    EmptyId,

    /// No record is stored for the given session id.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Stored record exists but is not a valid session.
    #[error("invalid session data: {0}")]
    InvalidData(String),

    /// Backend failure during the named operation.
    #[error("storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StorageError,
    },

    /// Session record could not be serialized.
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Mutation attempted on a destroyed session.
    #[error("session destroyed: {0}")]
    Destroyed(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl SessionError {
    /// Wrap a backend error with the operation that triggered it.
    pub fn storage(op: &'static str, source: StorageError) -> Self {
        Self::Storage { op, source }
    }

    /// Whether the caller supplied an empty key or id.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyKey | Self::EmptyId)
    }

    /// Whether the error means "no such session".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
