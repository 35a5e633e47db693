//! Vault configuration.
//!
//! All paths and tunables live in one [`VaultConfig`] passed to
//! [`crate::Vault::open`]. Nothing is read from the environment here.
//!
//! ```text
//! <dir of db_path>/
//! ├─ app.sqlite        # database file
//! ├─ app.sqlite.hash   # last synced fingerprint
//! ├─ app.sqlite.ts     # last sync timestamp
//! ├─ db.lock           # sentinel for the exclusive lock
//! └─ backups/
//!    ├─ db_1.sqlite    # newest generation
//!    ├─ db_2.sqlite
//!    └─ db_3.sqlite    # oldest retained generation
//! ```

use crate::error::{CoreError, CoreResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of retained generations, locally and remotely.
pub const DEFAULT_GENERATIONS: usize = 3;

/// Name of the table created in a fresh database when no schema is given.
pub const CREDENTIAL_TABLE: &str = "credentials";

/// Configuration for a [`crate::Vault`].
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Path of the database file.
    pub db_path: PathBuf,

    /// Directory holding the numbered local generations.
    pub backup_dir: PathBuf,

    /// Sentinel file used for the cross-process lock.
    pub lock_path: PathBuf,

    /// Sidecar file holding the last synced fingerprint.
    pub hash_path: PathBuf,

    /// Sidecar file holding the last sync timestamp.
    pub timestamp_path: PathBuf,

    /// Number of generations retained locally and remotely.
    pub generations: usize,

    /// File-name prefix for generations (`<prefix>_<slot>.sqlite`).
    pub generation_prefix: String,

    /// Tables that must exist for the database to count as valid.
    pub required_tables: Vec<String>,

    /// SQL used to initialize an empty database. When `None`, only the
    /// credential table is created.
    pub schema_sql: Option<String>,

    /// Maximum wait for the exclusive lock (`None` = wait forever).
    pub lock_timeout: Option<Duration>,

    /// How long SQLite waits on its own internal locks.
    pub busy_timeout: Duration,
}

impl VaultConfig {
    /// Creates a configuration with every sidecar derived from `db_path`.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let dir = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            backup_dir: dir.join("backups"),
            lock_path: dir.join("db.lock"),
            hash_path: with_suffix(&db_path, ".hash"),
            timestamp_path: with_suffix(&db_path, ".ts"),
            db_path,
            generations: DEFAULT_GENERATIONS,
            generation_prefix: "db".to_string(),
            required_tables: vec![CREDENTIAL_TABLE.to_string()],
            schema_sql: None,
            lock_timeout: None,
            busy_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the local backup directory.
    #[must_use]
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Sets the lock sentinel path.
    #[must_use]
    pub fn lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    /// Sets the number of retained generations.
    #[must_use]
    pub const fn generations(mut self, count: usize) -> Self {
        self.generations = count;
        self
    }

    /// Sets the generation file-name prefix.
    #[must_use]
    pub fn generation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.generation_prefix = prefix.into();
        self
    }

    /// Sets the tables required for validation.
    #[must_use]
    pub fn required_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the schema used for freshly created databases.
    #[must_use]
    pub fn schema_sql(mut self, sql: impl Into<String>) -> Self {
        self.schema_sql = Some(sql.into());
        self
    }

    /// Bounds how long lock acquisition may wait.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Sets SQLite's busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Returns the generation file name for `slot` (1-based).
    #[must_use]
    pub fn generation_name(&self, slot: usize) -> String {
        format!("{}_{slot}.sqlite", self.generation_prefix)
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the generation count is zero,
    /// the prefix is empty, or a sidecar collides with the database path.
    pub fn validate(&self) -> CoreResult<()> {
        if self.generations == 0 {
            return Err(CoreError::invalid_config(
                "at least one generation must be retained",
            ));
        }
        if self.generation_prefix.is_empty() || self.generation_prefix.contains(['/', '\\']) {
            return Err(CoreError::invalid_config(format!(
                "invalid generation prefix: {:?}",
                self.generation_prefix
            )));
        }
        for sidecar in [&self.lock_path, &self.hash_path, &self.timestamp_path] {
            if sidecar == &self.db_path {
                return Err(CoreError::invalid_config(format!(
                    "sidecar path collides with the database file: {}",
                    sidecar.display()
                )));
            }
        }
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let config = VaultConfig::new("/data/app.sqlite");
        assert_eq!(config.backup_dir, PathBuf::from("/data/backups"));
        assert_eq!(config.lock_path, PathBuf::from("/data/db.lock"));
        assert_eq!(config.hash_path, PathBuf::from("/data/app.sqlite.hash"));
        assert_eq!(config.timestamp_path, PathBuf::from("/data/app.sqlite.ts"));
        assert_eq!(config.generations, DEFAULT_GENERATIONS);
        assert_eq!(config.required_tables, vec![CREDENTIAL_TABLE.to_string()]);
        assert!(config.lock_timeout.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = VaultConfig::new("/data/app.sqlite")
            .generations(5)
            .generation_prefix("snap")
            .required_tables(["users", "orders"])
            .lock_timeout(Duration::from_secs(2));

        assert_eq!(config.generations, 5);
        assert_eq!(config.generation_name(4), "snap_4.sqlite");
        assert_eq!(config.required_tables.len(), 2);
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn zero_generations_rejected() {
        let config = VaultConfig::new("/data/app.sqlite").generations(0);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn colliding_sidecar_rejected() {
        let config = VaultConfig::new("/data/app.sqlite").lock_path("/data/app.sqlite");
        assert!(config.validate().is_err());
    }
}
