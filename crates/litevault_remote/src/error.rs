//! Error types for remote object store operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while talking to a remote object store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An I/O error occurred while streaming object content.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The referenced object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store could not be reached or refused to serve the request.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the caller's credentials.
    #[error("remote store rejected credentials: {0}")]
    Unauthorized(String),

    /// The store ran out of space for the caller.
    #[error("remote store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The call did not complete within its deadline.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Returns true if retrying the call later could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_) | RemoteError::Timeout(_) | RemoteError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RemoteError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(RemoteError::unavailable("down").is_transient());
        assert!(!RemoteError::NotFound("db_1.sqlite".into()).is_transient());
        assert!(!RemoteError::QuotaExceeded("full".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = RemoteError::NotFound("db_1.sqlite".into());
        assert!(err.to_string().contains("db_1.sqlite"));
    }
}
