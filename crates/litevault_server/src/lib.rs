//! # LiteVault Server
//!
//! Authenticated HTTP access to a LiteVault database.
//!
//! This crate provides:
//! - Bearer token authentication (HMAC-SHA256 tokens)
//! - JSON handlers for query, backup, restore and status endpoints
//! - A fixed worker pool serving HTTP over `tiny_http`
//!
//! # Endpoints
//!
//! | Method & path      | Auth   | Purpose                                  |
//! |--------------------|--------|------------------------------------------|
//! | `POST /login`      | none   | exchange username/password for a token   |
//! | `POST /query`      | bearer | run SQL; writes go through change-sync   |
//! | `GET /health`      | none   | file present and schema valid            |
//! | `POST /init`       | bearer | run the recovery cascade                 |
//! | `POST /backup`     | bearer | rotate generations now                   |
//! | `POST /restore`    | bearer | restore the newest local generation      |
//! | `GET /sync-state`  | bearer | last synced fingerprint and timestamp    |
//! | `GET /status`      | bearer | database, generations and counters       |
//! | `GET /logs`        | bearer | tail of the log file                     |
//!
//! Client SQL is passed through to SQLite unchanged. Anyone holding a
//! token has full read/write access to the database.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{bearer_token, AuthConfig, TokenValidator};
pub use config::{AdminCredentials, ServerConfig, DEFAULT_TOKEN_EXPIRY};
pub use error::{ServerError, ServerResult};
pub use handler::{
    tail_chars, ApiMethod, ApiRequest, ApiResponse, RequestHandler, ResponseBody, LOG_TAIL_CHARS,
};
pub use server::{prepare_vault, ServerHandle, VaultServer};
