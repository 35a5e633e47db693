//! Error types for the HTTP server.

use litevault_core::CoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving requests.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or missing fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Login with wrong credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Missing, malformed or expired bearer token.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Unknown route or missing resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Known route, wrong method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Request body over the configured limit.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Failure reported by the vault.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::AuthenticationFailed(_)
            | ServerError::NotAuthorized(_)
            | ServerError::NotFound(_)
            | ServerError::MethodNotAllowed(_)
            | ServerError::PayloadTooLarge(_) => true,
            ServerError::Core(e) => e.is_client_error(),
            ServerError::Internal(_) | ServerError::Io(_) => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// HTTP status code for the response.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::AuthenticationFailed(_) | ServerError::NotAuthorized(_) => 401,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::PayloadTooLarge(_) => 413,
            ServerError::Core(e) if e.is_client_error() => 400,
            ServerError::Core(_) | ServerError::Internal(_) | ServerError::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn core_errors_split_by_cause() {
        let client = ServerError::from(CoreError::invalid_operation("read-only"));
        let server = ServerError::from(CoreError::schema("missing tables"));

        assert_eq!(client.status_code(), 400);
        assert_eq!(server.status_code(), 500);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::NotAuthorized("expired".into()).status_code(), 401);
        assert_eq!(ServerError::NotFound("/nope".into()).status_code(), 404);
        assert_eq!(ServerError::PayloadTooLarge(10).status_code(), 413);
    }
}
