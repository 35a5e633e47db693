//! Test fixtures and vault helpers.
//!
//! Every fixture owns a temporary directory holding the database, its
//! sidecars and the local generations, plus an in-memory remote that
//! outlives [`TestVault::reopen`] so restarts can be simulated.

use crate::faults::FlakyObjectStore;
use litevault_core::{fingerprint, Fingerprint, Vault, VaultConfig};
use litevault_remote::{InMemoryObjectStore, ObjectStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test vault with automatic cleanup.
pub struct TestVault {
    /// The vault instance.
    pub vault: Vault,
    /// The in-memory remote behind the vault (possibly wrapped).
    pub remote: Arc<InMemoryObjectStore>,
    store: Arc<dyn ObjectStore>,
    config: VaultConfig,
    temp_dir: TempDir,
}

impl TestVault {
    /// Creates a vault with the default configuration. The database
    /// does not exist yet.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates a vault whose configuration is adjusted by `configure`.
    pub fn with_config(configure: impl FnOnce(VaultConfig) -> VaultConfig) -> Self {
        let remote = Arc::new(InMemoryObjectStore::new());
        Self::build(configure, Arc::clone(&remote) as Arc<dyn ObjectStore>, remote)
    }

    /// Creates a vault whose remote calls pass through a
    /// [`FlakyObjectStore`] the caller can switch into failure.
    pub fn with_faults() -> (Self, Arc<FlakyObjectStore>) {
        let remote = Arc::new(InMemoryObjectStore::new());
        let flaky = Arc::new(FlakyObjectStore::new(
            Arc::clone(&remote) as Arc<dyn ObjectStore>
        ));
        let fixture = Self::build(
            |config| config,
            Arc::clone(&flaky) as Arc<dyn ObjectStore>,
            remote,
        );
        (fixture, flaky)
    }

    /// Creates a vault and runs the recovery cascade on it.
    pub fn available() -> Self {
        let fixture = Self::new();
        fixture
            .vault
            .ensure_available()
            .expect("Failed to make database available");
        fixture
    }

    fn build(
        configure: impl FnOnce(VaultConfig) -> VaultConfig,
        store: Arc<dyn ObjectStore>,
        remote: Arc<InMemoryObjectStore>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(VaultConfig::new(temp_dir.path().join("app.sqlite")));
        let vault =
            Vault::open(config.clone(), Arc::clone(&store)).expect("Failed to open vault");

        Self {
            vault,
            remote,
            store,
            config,
            temp_dir,
        }
    }

    /// Returns the temporary directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the database path.
    pub fn db_path(&self) -> &Path {
        &self.config.db_path
    }

    /// Returns the path of local generation `slot`.
    pub fn local_slot(&self, slot: usize) -> PathBuf {
        self.vault.local_generations().slot_path(slot)
    }

    /// Fingerprint of the live database file.
    pub fn db_fingerprint(&self) -> Fingerprint {
        fingerprint(self.db_path()).expect("Failed to fingerprint database")
    }

    /// Fingerprint of local generation `slot`.
    pub fn local_fingerprint(&self, slot: usize) -> Fingerprint {
        fingerprint(&self.local_slot(slot)).expect("Failed to fingerprint local generation")
    }

    /// Fingerprint of the remote object for `slot`, if present.
    pub fn remote_fingerprint(&self, slot: usize) -> Option<Fingerprint> {
        let data = self.remote.contents(&self.config.generation_name(slot))?;
        Some(
            litevault_core::fingerprint_reader(&mut data.as_slice())
                .expect("Failed to fingerprint remote generation"),
        )
    }

    /// Replaces the vault with a fresh instance over the same files and
    /// remote, as after a process restart.
    pub fn reopen(&mut self) {
        self.vault = Vault::open(self.config.clone(), Arc::clone(&self.store))
            .expect("Failed to reopen vault");
    }

    /// Deletes the database and its rollback journal.
    pub fn delete_database(&self) {
        remove_if_exists(self.db_path());
        remove_if_exists(&with_suffix(self.db_path(), "-journal"));
    }

    /// Deletes every local generation.
    pub fn delete_local_generations(&self) {
        let dir = &self.config.backup_dir;
        if dir.exists() {
            fs::remove_dir_all(dir).expect("Failed to remove backup directory");
        }
    }

    /// Overwrites the database with bytes SQLite cannot open.
    pub fn corrupt_database(&self) {
        fs::write(self.db_path(), b"this is not an sqlite database, only noise")
            .expect("Failed to corrupt database");
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestVault {
    type Target = Vault;

    fn deref(&self) -> &Self::Target {
        &self.vault
    }
}

/// Runs a test with an available vault.
///
/// # Example
///
/// ```rust,ignore
/// use litevault_testkit::with_test_vault;
///
/// #[test]
/// fn my_test() {
///     with_test_vault(|fixture| {
///         fixture.execute_write("CREATE TABLE t(x)").unwrap();
///     });
/// }
/// ```
pub fn with_test_vault<F, R>(f: F) -> R
where
    F: FnOnce(&TestVault) -> R,
{
    let fixture = TestVault::available();
    f(&fixture)
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        fs::remove_file(path).expect("Failed to remove file");
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an available vault with a `notes` table holding `rows`
    /// rows, each inserted by its own write.
    pub fn populated_vault(rows: usize) -> TestVault {
        let fixture = TestVault::available();
        fixture
            .execute_write("CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT)")
            .expect("Failed to create table");
        for i in 0..rows {
            fixture
                .execute_write(&format!("INSERT INTO notes(body) VALUES ('note {i}')"))
                .expect("Failed to insert row");
        }
        fixture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fixture_has_no_database() {
        let fixture = TestVault::new();
        assert!(!fixture.db_path().exists());
        assert!(fixture.remote.is_empty());
    }

    #[test]
    fn available_fixture_is_healthy() {
        with_test_vault(|fixture| {
            assert!(fixture.is_healthy());
            assert!(fixture.db_path().starts_with(fixture.dir()));
        });
    }

    #[test]
    fn faulty_fixture_writes_through_to_inner_store() {
        let (fixture, flaky) = TestVault::with_faults();
        fixture.ensure_available().unwrap();
        fixture.execute_write("CREATE TABLE t(x)").unwrap();

        assert!(fixture.remote.contents("db_1.sqlite").is_some());
        assert!(flaky.calls() > 0);
        assert_eq!(flaky.failures(), 0);
    }

    #[test]
    fn populated_scenario_counts_rows() {
        let fixture = scenarios::populated_vault(3);
        let rows = fixture.execute_read("SELECT COUNT(*) FROM notes").unwrap();
        assert_eq!(rows.rows[0][0], litevault_core::SqlValue::Integer(3));
    }
}
