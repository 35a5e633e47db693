//! Error types for LiteVault core.

use litevault_remote::RemoteError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in LiteVault core operations.
///
/// Local, authoritative-path failures (`Io`, `Schema`, `SqlExecution`)
/// surface to callers. `RemoteUnavailable` is produced by the remote tier
/// but is caught at the remote boundary and logged rather than returned
/// from write or recovery paths.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Local filesystem failure during copy, fingerprint or rotation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database file is unreadable or lacks required tables.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// A client statement failed; its transaction was rolled back.
    #[error("SQL execution failed: {0}")]
    SqlExecution(#[source] rusqlite::Error),

    /// Engine failure outside of a client statement.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The remote object store could not complete a request.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(#[from] RemoteError),

    /// The exclusive lock was not obtained within the configured timeout.
    #[error("timed out after {0:?} waiting for the database lock")]
    LockTimeout(Duration),

    /// Password hashing or verification failed.
    #[error("credential error: {message}")]
    Credential {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted for the given input.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Configuration is inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a credential error.
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::SqlExecution(_) | CoreError::InvalidOperation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_classification() {
        let err = CoreError::SqlExecution(rusqlite::Error::InvalidQuery);
        assert!(err.is_client_error());
        assert!(CoreError::invalid_operation("nope").is_client_error());
        assert!(!CoreError::schema("missing tables").is_client_error());
    }

    #[test]
    fn lock_timeout_display() {
        let err = CoreError::LockTimeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
