//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default bearer token lifetime.
pub const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Configuration for the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Number of worker threads handling requests.
    pub workers: usize,
    /// Secret key for signing bearer tokens.
    pub auth_secret: Vec<u8>,
    /// Token lifetime.
    pub token_expiry: Duration,
    /// Maximum accepted request body.
    pub max_body_bytes: usize,
    /// Plain-text log file served by `/logs`.
    pub log_path: Option<PathBuf>,
    /// Administrator created at startup if missing.
    pub admin: Option<AdminCredentials>,
}

/// Username and password of the bootstrap administrator.
#[derive(Clone)]
pub struct AdminCredentials {
    /// Username.
    pub username: String,
    /// Plain-text password; hashed before it is stored.
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("workers", &self.workers)
            .field("auth_secret", &"<redacted>")
            .field("token_expiry", &self.token_expiry)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("log_path", &self.log_path)
            .field("admin", &self.admin)
            .finish()
    }
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr, auth_secret: Vec<u8>) -> Self {
        Self {
            bind_addr,
            workers: 4,
            auth_secret,
            token_expiry: DEFAULT_TOKEN_EXPIRY,
            max_body_bytes: 1024 * 1024,
            log_path: None,
            admin: None,
        }
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets the log file served by `/logs`.
    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Ensures an administrator account exists at startup.
    #[must_use]
    pub fn with_admin(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin = Some(AdminCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = ServerConfig::new("127.0.0.1:5000".parse().unwrap(), b"k".to_vec());
        assert_eq!(config.workers, 4);
        assert_eq!(config.token_expiry, DEFAULT_TOKEN_EXPIRY);
        assert!(config.admin.is_none());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap(), b"k".to_vec())
            .with_workers(0)
            .with_max_body_bytes(64)
            .with_admin("admin", "pw");

        assert_eq!(config.workers, 1);
        assert_eq!(config.max_body_bytes, 64);
        assert_eq!(config.admin.unwrap().username, "admin");
    }

    #[test]
    fn debug_hides_secrets() {
        let config = ServerConfig::new("127.0.0.1:5000".parse().unwrap(), b"topsecret".to_vec())
            .with_admin("admin", "hunter2");
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("116, 111, 112"));
    }
}
