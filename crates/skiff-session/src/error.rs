//! Error types for session store operations.

use std::path::PathBuf;

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session was not found in storage.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session id cannot be used as a file name.
    #[error("Invalid session id: {0}")]
    InvalidId(String),

    /// Filesystem error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Could not take the pointer lock.
    #[error("Lock error: {0}")]
    Lock(String),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
