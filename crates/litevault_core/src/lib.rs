//! # LiteVault Core
//!
//! Availability and backup rotation for a single SQLite database file.
//!
//! This crate provides:
//! - Content fingerprinting (SHA-256 of the file bytes)
//! - A file lock guard (in-process `RwLock` + cross-process `fs2` lock)
//! - Local and remote generation stores (`N` rotating snapshots)
//! - A recovery engine (validate → local restore → remote fetch → create)
//! - The change-sync orchestrator, [`Vault`], which fingerprints every
//!   committed write and rotates backups only when content changed
//! - Credential records stored inside the database
//!
//! # Example
//!
//! ```rust,no_run
//! use litevault_core::{Vault, VaultConfig};
//! use litevault_remote::DirectoryObjectStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let remote = Arc::new(DirectoryObjectStore::open(Path::new("/mnt/share/litevault"))?);
//! let vault = Vault::open(VaultConfig::new("/data/app.sqlite"), remote)?;
//!
//! let report = vault.ensure_available()?;
//! println!("database ready: {:?}", report.outcome);
//!
//! let outcome = vault.execute_write("INSERT INTO credentials (username, password) VALUES ('a', 'b')")?;
//! assert!(outcome.changed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod credentials;
mod error;
mod fingerprint;
mod generations;
mod lock;
mod recovery;
mod remote;
mod schema;
mod statement;
mod stats;
mod sync_state;
mod vault;

pub use config::{VaultConfig, CREDENTIAL_TABLE, DEFAULT_GENERATIONS};
pub use credentials::{hash_password, validate_username, verify_password, CREDENTIAL_TABLE_SQL};
pub use error::{CoreError, CoreResult};
pub use fingerprint::{fingerprint, fingerprint_reader, Fingerprint, FINGERPRINT_CHUNK};
pub use generations::{GenerationInfo, LocalGenerations};
pub use lock::{ExclusiveGuard, FileLock, SharedGuard};
pub use recovery::{
    run as run_recovery, RecoveryActions, RecoveryOutcome, RecoveryReport, RecoveryState,
    Transition, ValidationStage,
};
pub use remote::RemoteGenerations;
pub use schema::{create_empty, validate};
pub use statement::{QueryRows, SqlValue, StatementKind};
pub use stats::VaultStats;
pub use sync_state::{unix_now, SyncState, SyncStateStore};
pub use vault::{BackupOutcome, StatementOutcome, StatusReport, Vault, WriteOutcome};
