//! Credential records stored inside the database.
//!
//! Passwords are kept as Argon2 PHC strings (salt and parameters embedded),
//! never in plain text. The table is:
//!
//! ```sql
//! CREATE TABLE credentials (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     username TEXT NOT NULL UNIQUE,
//!     password TEXT NOT NULL,
//!     created_at TEXT DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
//!
//! The SQL helpers here only build and run statements; callers decide which
//! lock and which transaction they run under. Mutations go through
//! [`crate::Vault`] so they are fingerprinted and backed up like any write.

use crate::error::{CoreError, CoreResult};
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};

/// DDL for the credential table.
pub const CREDENTIAL_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);";

const MAX_USERNAME_LEN: usize = 128;
const SALT_LEN: usize = 16;

/// Hashes `password` with a fresh random salt.
///
/// # Errors
///
/// Returns [`CoreError::Credential`] if hashing fails.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| CoreError::credential(e.to_string()))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::credential(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string.
///
/// # Errors
///
/// Returns [`CoreError::Credential`] if the stored hash is malformed.
pub fn verify_password(password: &str, stored: &str) -> CoreResult<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| CoreError::credential(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CoreError::credential(e.to_string())),
    }
}

/// Rejects usernames that are empty, padded or too long.
///
/// # Errors
///
/// Returns [`CoreError::InvalidOperation`] describing the problem.
pub fn validate_username(username: &str) -> CoreResult<()> {
    if username.is_empty() {
        return Err(CoreError::invalid_operation("username must not be empty"));
    }
    if username.trim() != username {
        return Err(CoreError::invalid_operation(
            "username must not start or end with whitespace",
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(CoreError::invalid_operation(format!(
            "username longer than {MAX_USERNAME_LEN} bytes"
        )));
    }
    Ok(())
}

pub(crate) fn stored_hash(conn: &Connection, username: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT password FROM credentials WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn count_users(conn: &Connection) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM credentials", [], |row| row.get(0))?;
    u64::try_from(count).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count))
}

/// Inserts the user unless the name is taken. Returns rows inserted.
pub(crate) fn insert_user(conn: &Connection, username: &str, hash: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO credentials (username, password) VALUES (?1, ?2)",
        params![username, hash],
    )
}
