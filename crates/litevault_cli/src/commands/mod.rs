//! CLI command implementations.

pub mod backup;
pub mod fingerprint;
pub mod init;
pub mod serve;
pub mod status;
pub mod user;
pub mod verify;

use litevault_core::{Vault, VaultConfig};
use litevault_remote::{DirectoryObjectStore, DisabledObjectStore, ObjectStore, TimeoutObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options shared by every command that touches the database.
#[derive(Debug, Clone)]
pub struct VaultOptions {
    /// Database file.
    pub db_path: PathBuf,
    /// Local generation directory override.
    pub backup_dir: Option<PathBuf>,
    /// Directory-backed remote store.
    pub remote_dir: Option<PathBuf>,
    /// Per-call remote deadline.
    pub remote_timeout_secs: u64,
    /// Retained generations.
    pub generations: usize,
}

impl VaultOptions {
    /// Builds the vault configuration.
    pub fn config(&self) -> VaultConfig {
        let mut config = VaultConfig::new(&self.db_path).generations(self.generations);
        if let Some(dir) = &self.backup_dir {
            config = config.backup_dir(dir);
        }
        config
    }

    /// Builds the remote store: a time-bounded directory store, or a
    /// disabled store when no remote is configured.
    pub fn remote_store(&self) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
        match &self.remote_dir {
            Some(dir) => {
                let store = DirectoryObjectStore::open(dir)?;
                info!(remote = %dir.display(), timeout_secs = self.remote_timeout_secs, "remote store configured");
                Ok(Arc::new(TimeoutObjectStore::new(
                    store,
                    Duration::from_secs(self.remote_timeout_secs),
                )))
            }
            None => {
                warn!("no remote store configured; remote backups are disabled");
                Ok(Arc::new(DisabledObjectStore))
            }
        }
    }

    /// Opens the vault.
    pub fn open(&self) -> Result<Vault, Box<dyn std::error::Error>> {
        Ok(Vault::open(self.config(), self.remote_store()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(root: &std::path::Path, remote: bool) -> VaultOptions {
        VaultOptions {
            db_path: root.join("app.sqlite"),
            backup_dir: Some(root.join("snapshots")),
            remote_dir: remote.then(|| root.join("remote")),
            remote_timeout_secs: 5,
            generations: 2,
        }
    }

    #[test]
    fn config_applies_overrides() {
        let temp = tempdir().unwrap();
        let config = options(temp.path(), false).config();

        assert_eq!(config.backup_dir, temp.path().join("snapshots"));
        assert_eq!(config.generations, 2);
    }

    #[test]
    fn directory_remote_receives_backups() {
        let temp = tempdir().unwrap();
        let vault = options(temp.path(), true).open().unwrap();
        vault.ensure_available().unwrap();

        assert!(vault.backup_now().unwrap().remote_synced);
        assert!(std::fs::read_dir(temp.path().join("remote")).unwrap().count() >= 1);
    }

    #[test]
    fn missing_remote_degrades_to_local_only() {
        let temp = tempdir().unwrap();
        let vault = options(temp.path(), false).open().unwrap();
        vault.ensure_available().unwrap();

        assert!(!vault.backup_now().unwrap().remote_synced);
        assert!(temp.path().join("snapshots").join("db_1.sqlite").exists());
    }
}
