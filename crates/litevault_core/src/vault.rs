//! The vault: change-sync orchestrator and entry point.

use crate::config::VaultConfig;
use crate::credentials;
use crate::error::{CoreError, CoreResult};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::generations::{GenerationInfo, LocalGenerations};
use crate::lock::FileLock;
use crate::recovery::{self, FileRecovery, RecoveryReport};
use crate::remote::RemoteGenerations;
use crate::schema::{self, Access};
use crate::statement::{QueryRows, SqlValue, StatementKind};
use crate::stats::{VaultCounters, VaultStats};
use crate::sync_state::{unix_now, SyncState, SyncStateStore};
use litevault_remote::ObjectStore;
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a committed write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    /// Fingerprint of the database after the commit.
    pub fingerprint: Fingerprint,
    /// Whether the content differs from the last synced fingerprint. Only
    /// changed writes trigger a rotation.
    pub changed: bool,
    /// Rows inserted, updated or deleted by the statement.
    pub rows_affected: usize,
}

/// Result of [`Vault::execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatementOutcome {
    /// The statement was classified as a write.
    Write(WriteOutcome),
    /// The statement was classified as a read.
    Read(QueryRows),
}

/// Result of a manual backup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupOutcome {
    /// Fingerprint of the file that was backed up.
    pub fingerprint: Fingerprint,
    /// Whether the remote rotation succeeded.
    pub remote_synced: bool,
}

/// Point-in-time description of the database and its backups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Database file path.
    pub db_path: PathBuf,
    /// Whether the database file exists.
    pub exists: bool,
    /// Database file size in bytes.
    pub size: Option<u64>,
    /// Persisted sync state.
    pub sync_state: SyncState,
    /// Number of credential records, if the table is readable.
    pub user_count: Option<u64>,
    /// Retained local generations, newest first.
    pub generations: Vec<GenerationInfo>,
    /// Counters since the vault was opened.
    pub stats: VaultStats,
}

/// Keeps one SQLite database file available and backed up.
///
/// Every mutation goes through the change-sync path:
///
/// 1. take the exclusive lock,
/// 2. run the statement in a transaction and commit,
/// 3. fingerprint the file,
/// 4. if the fingerprint differs from the persisted one, save the new
///    sync state and rotate local then remote generations,
/// 5. release the lock.
///
/// Readers take a shared lock, so they never observe a file that is
/// being replaced by recovery or restore.
///
/// # Thread Safety
///
/// `Vault` is `Send + Sync`; share it behind an `Arc`. Guarded sections
/// are not re-entrant, so no public method calls another while holding
/// the lock.
///
/// # Example
///
/// ```rust,no_run
/// use litevault_core::{Vault, VaultConfig};
/// use litevault_remote::InMemoryObjectStore;
/// use std::sync::Arc;
///
/// let vault = Vault::open(VaultConfig::new("data/app.sqlite"), Arc::new(InMemoryObjectStore::new()))?;
/// vault.ensure_available()?;
/// vault.execute_write("CREATE TABLE notes(body TEXT)")?;
/// let rows = vault.execute_read("SELECT COUNT(*) FROM notes")?;
/// assert_eq!(rows.len(), 1);
/// # Ok::<(), litevault_core::CoreError>(())
/// ```
pub struct Vault {
    config: VaultConfig,
    lock: FileLock,
    local: LocalGenerations,
    remote: RemoteGenerations,
    sync_state: SyncStateStore,
    counters: VaultCounters,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("db_path", &self.config.db_path)
            .field("generations", &self.config.generations)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Creates a vault over the configured paths and remote store.
    ///
    /// Nothing is validated or repaired yet; call
    /// [`ensure_available`](Self::ensure_available) for that.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an inconsistent config, or
    /// an I/O error if the lock directory cannot be created.
    pub fn open(config: VaultConfig, store: Arc<dyn ObjectStore>) -> CoreResult<Self> {
        config.validate()?;

        let lock = FileLock::new(&config.lock_path, config.lock_timeout)?;
        let local = LocalGenerations::new(
            &config.backup_dir,
            &config.generation_prefix,
            config.generations,
        );
        let remote = RemoteGenerations::new(store, &config.generation_prefix, config.generations);
        let sync_state = SyncStateStore::new(&config.hash_path, &config.timestamp_path);

        debug!(db = %config.db_path.display(), "vault opened");
        Ok(Self {
            config,
            lock,
            local,
            remote,
            sync_state,
            counters: VaultCounters::default(),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Returns the local generation store.
    #[must_use]
    pub fn local_generations(&self) -> &LocalGenerations {
        &self.local
    }

    /// Runs the recovery cascade under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Only local I/O failures surface; everything else falls through to
    /// the next fallback and, at worst, a fresh empty database.
    pub fn ensure_available(&self) -> CoreResult<RecoveryReport> {
        let _guard = self.lock.acquire()?;
        let report = recovery::run(&FileRecovery {
            config: &self.config,
            local: &self.local,
            remote: &self.remote,
        })?;
        self.counters.record_recovery();
        Ok(report)
    }

    /// Runs `sql` as a write through the change-sync path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SqlExecution`] if the statement fails; the
    /// transaction is rolled back and neither the file nor the sync state
    /// changes. Local I/O failures while fingerprinting or saving the sync
    /// state are returned after the commit.
    pub fn execute_write(&self, sql: &str) -> CoreResult<WriteOutcome> {
        self.commit_and_sync(|conn| conn.execute(sql, []).map_err(CoreError::SqlExecution))
    }

    /// Runs `sql` as a read and returns every row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the statement would
    /// modify the database, or [`CoreError::SqlExecution`] if it fails.
    pub fn execute_read(&self, sql: &str) -> CoreResult<QueryRows> {
        let _guard = self.lock.acquire_shared()?;
        let conn = schema::open(&self.config.db_path, Access::ReadOnly, self.config.busy_timeout)?;

        let mut stmt = conn.prepare(sql).map_err(CoreError::SqlExecution)?;
        if !stmt.readonly() {
            return Err(CoreError::invalid_operation(
                "statement modifies the database and must be submitted as a write",
            ));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rows = stmt.query([]).map_err(CoreError::SqlExecution)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(CoreError::SqlExecution)? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(SqlValue::from(
                    row.get_ref(index).map_err(CoreError::SqlExecution)?,
                ));
            }
            result.push(values);
        }

        Ok(QueryRows {
            columns,
            rows: result,
        })
    }

    /// Classifies `sql` and dispatches to a write or a read.
    ///
    /// # Errors
    ///
    /// See [`execute_write`](Self::execute_write) and
    /// [`execute_read`](Self::execute_read).
    pub fn execute(&self, sql: &str) -> CoreResult<StatementOutcome> {
        match StatementKind::classify(sql) {
            StatementKind::Write => self.execute_write(sql).map(StatementOutcome::Write),
            StatementKind::Read => self.execute_read(sql).map(StatementOutcome::Read),
        }
    }

    /// Returns the persisted sync state.
    ///
    /// # Errors
    ///
    /// Returns an error if a sidecar cannot be read.
    pub fn current_sync_state(&self) -> CoreResult<SyncState> {
        let _guard = self.lock.acquire_shared()?;
        self.sync_state.load()
    }

    /// Rotates local and remote generations from the current file,
    /// regardless of whether it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be fingerprinted or the local
    /// rotation fails. Remote failure is reported in the outcome only.
    pub fn backup_now(&self) -> CoreResult<BackupOutcome> {
        let _guard = self.lock.acquire()?;
        let fingerprint = fingerprint(&self.config.db_path)?;

        if let Err(e) = self.local.rotate(&self.config.db_path) {
            self.counters.record_rotation(false, None);
            return Err(e);
        }
        let remote_synced = self.remote.rotate(&self.local.slot_path(1));
        self.counters.record_rotation(true, Some(remote_synced));

        info!(%fingerprint, remote_synced, "manual backup complete");
        Ok(BackupOutcome {
            fingerprint,
            remote_synced,
        })
    }

    /// Replaces the database with the newest local generation.
    ///
    /// On success the sync state is updated to the restored content.
    /// Returns `false` if there is no local generation.
    ///
    /// # Errors
    ///
    /// Returns an error on local I/O failure.
    pub fn restore_now(&self) -> CoreResult<bool> {
        let _guard = self.lock.acquire()?;
        if !self.local.restore_latest(&self.config.db_path)? {
            return Ok(false);
        }
        schema::discard_journals(&self.config.db_path)?;

        let fingerprint = fingerprint(&self.config.db_path)?;
        self.sync_state.save(&fingerprint, unix_now())?;
        info!(%fingerprint, "database restored from local generation");
        Ok(true)
    }

    /// Returns true if the database file exists and passes validation.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let Ok(_guard) = self.lock.acquire_shared() else {
            return false;
        };
        self.config.db_path.is_file()
            && schema::validate(
                &self.config.db_path,
                &self.config.required_tables,
                self.config.busy_timeout,
            )
            .is_ok()
    }

    /// Returns in-process counters.
    #[must_use]
    pub fn stats(&self) -> VaultStats {
        self.counters.snapshot()
    }

    /// Describes the database file, its backups and the counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecars or backup directory cannot be read.
    pub fn status(&self) -> CoreResult<StatusReport> {
        let _guard = self.lock.acquire_shared()?;
        let metadata = fs::metadata(&self.config.db_path).ok();

        let user_count = if metadata.is_some() {
            self.read_connection()
                .and_then(|conn| credentials::count_users(&conn).map_err(CoreError::Database))
                .map_err(|e| debug!(error = %e, "user count unavailable"))
                .ok()
        } else {
            None
        };

        Ok(StatusReport {
            db_path: self.config.db_path.clone(),
            exists: metadata.is_some(),
            size: metadata.map(|m| m.len()),
            sync_state: self.sync_state.load()?,
            user_count,
            generations: self.local.list()?,
            stats: self.counters.snapshot(),
        })
    }

    /// Creates the credential table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn ensure_credential_table(&self) -> CoreResult<WriteOutcome> {
        self.commit_and_sync(|conn| {
            conn.execute_batch(credentials::CREDENTIAL_TABLE_SQL)
                .map(|()| 0)
                .map_err(CoreError::SqlExecution)
        })
    }

    /// Adds `username` with a freshly hashed `password` unless the name
    /// already exists. Returns whether a user was created.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for an invalid username, or
    /// an error if hashing or the insert fails.
    pub fn ensure_user(&self, username: &str, password: &str) -> CoreResult<bool> {
        credentials::validate_username(username)?;
        if self.lookup_hash(username)?.is_some() {
            return Ok(false);
        }

        let hash = credentials::hash_password(password)?;
        let outcome = self.commit_and_sync(|conn| {
            credentials::insert_user(conn, username, &hash).map_err(CoreError::SqlExecution)
        })?;
        let created = outcome.rows_affected > 0;
        if created {
            info!(username, "user created");
        }
        Ok(created)
    }

    /// Checks a username and password against the credential table.
    ///
    /// Unknown users and wrong passwords both yield `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or the stored hash is
    /// malformed.
    pub fn verify_credentials(&self, username: &str, password: &str) -> CoreResult<bool> {
        match self.lookup_hash(username)? {
            Some(stored) => credentials::verify_password(password, &stored),
            None => Ok(false),
        }
    }

    /// Number of credential records.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn user_count(&self) -> CoreResult<u64> {
        let _guard = self.lock.acquire_shared()?;
        let conn = self.read_connection()?;
        Ok(credentials::count_users(&conn)?)
    }

    fn lookup_hash(&self, username: &str) -> CoreResult<Option<String>> {
        let _guard = self.lock.acquire_shared()?;
        let conn = self.read_connection()?;
        Ok(credentials::stored_hash(&conn, username)?)
    }

    fn read_connection(&self) -> CoreResult<Connection> {
        Ok(schema::open(
            &self.config.db_path,
            Access::ReadOnly,
            self.config.busy_timeout,
        )?)
    }

    /// The change-sync path shared by every mutation.
    ///
    /// `op` runs inside a transaction; an error from it rolls back and is
    /// returned unchanged. The whole sequence holds the exclusive lock.
    fn commit_and_sync<F>(&self, op: F) -> CoreResult<WriteOutcome>
    where
        F: FnOnce(&Connection) -> CoreResult<usize>,
    {
        let _guard = self.lock.acquire()?;

        let mut conn = schema::open(&self.config.db_path, Access::ReadWrite, self.config.busy_timeout)?;
        let tx = conn.transaction()?;
        let rows_affected = match op(&tx) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "write failed, rolling back");
                return Err(e);
            }
        };
        tx.commit().map_err(CoreError::SqlExecution)?;
        conn.close().map_err(|(_, e)| CoreError::Database(e))?;

        let fingerprint = fingerprint(&self.config.db_path)?;
        let previous = self.sync_state.last_fingerprint()?;
        if previous.as_ref() == Some(&fingerprint) {
            self.counters.record_write(false);
            debug!(%fingerprint, "content unchanged, skipping rotation");
            return Ok(WriteOutcome {
                fingerprint,
                changed: false,
                rows_affected,
            });
        }

        self.counters.record_write(true);
        self.sync_state.save(&fingerprint, unix_now())?;
        self.rotate_after_change();

        info!(%fingerprint, rows_affected, "write committed and synced");
        Ok(WriteOutcome {
            fingerprint,
            changed: true,
            rows_affected,
        })
    }

    /// Local then remote rotation. Neither failure undoes the commit.
    fn rotate_after_change(&self) {
        if let Err(e) = self.local.rotate(&self.config.db_path) {
            error!(error = %e, "local rotation failed, skipping remote rotation");
            self.counters.record_rotation(false, None);
            return;
        }
        let remote_ok = self.remote.rotate(&self.local.slot_path(1));
        if !remote_ok {
            warn!("remote rotation failed; local generations are current");
        }
        self.counters.record_rotation(true, Some(remote_ok));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litevault_remote::{DisabledObjectStore, InMemoryObjectStore};
    use std::path::Path;
    use tempfile::tempdir;

    fn open_vault(dir: &Path, store: Arc<dyn ObjectStore>) -> Vault {
        let vault = Vault::open(VaultConfig::new(dir.join("app.sqlite")), store).unwrap();
        vault.ensure_available().unwrap();
        vault
    }

    #[test]
    fn fresh_vault_creates_valid_database() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));

        assert!(vault.is_healthy());
        assert_eq!(vault.user_count().unwrap(), 0);
    }

    #[test]
    fn write_rotates_and_persists_state() {
        let temp = tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        let vault = open_vault(temp.path(), Arc::clone(&store) as Arc<dyn ObjectStore>);

        let outcome = vault.execute_write("CREATE TABLE t(x)").unwrap();

        assert!(outcome.changed);
        let state = vault.current_sync_state().unwrap();
        assert_eq!(state.fingerprint, Some(outcome.fingerprint.clone()));
        assert!(state.timestamp.is_some());
        assert_eq!(
            fingerprint(&vault.local_generations().slot_path(1)).unwrap(),
            outcome.fingerprint
        );
        assert!(store.contents("db_1.sqlite").is_some());
    }

    #[test]
    fn noop_write_does_not_rotate() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(InMemoryObjectStore::new()));
        vault.execute_write("CREATE TABLE t(x)").unwrap();
        let state = vault.current_sync_state().unwrap();
        let generations = vault.local_generations().list().unwrap();

        let outcome = vault.execute_write("UPDATE t SET x = 1 WHERE 0").unwrap();

        assert!(!outcome.changed);
        assert_eq!(vault.current_sync_state().unwrap(), state);
        assert_eq!(vault.local_generations().list().unwrap(), generations);
        assert_eq!(vault.stats().unchanged_writes, 1);
    }

    #[test]
    fn failed_write_rolls_back() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        vault.execute_write("CREATE TABLE t(x UNIQUE)").unwrap();
        vault.execute_write("INSERT INTO t VALUES (1)").unwrap();
        let before = fingerprint(&vault.config().db_path).unwrap();
        let state = vault.current_sync_state().unwrap();

        let result = vault.execute_write("INSERT INTO t VALUES (1)");

        assert!(matches!(result, Err(CoreError::SqlExecution(_))));
        assert_eq!(fingerprint(&vault.config().db_path).unwrap(), before);
        assert_eq!(vault.current_sync_state().unwrap(), state);
    }

    #[test]
    fn read_returns_columns_and_rows() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        vault.execute_write("CREATE TABLE t(x INTEGER, y TEXT)").unwrap();
        vault.execute_write("INSERT INTO t VALUES (7, 'seven')").unwrap();

        let rows = vault.execute_read("SELECT x, y FROM t").unwrap();

        assert_eq!(rows.columns, vec!["x", "y"]);
        assert_eq!(
            rows.rows,
            vec![vec![SqlValue::Integer(7), SqlValue::Text("seven".into())]]
        );
    }

    #[test]
    fn read_refuses_mutating_statement() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        vault.execute_write("CREATE TABLE t(x)").unwrap();

        let result = vault.execute_read("WITH v AS (SELECT 1) INSERT INTO t SELECT * FROM v");
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn execute_dispatches_by_kind() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));

        assert!(matches!(
            vault.execute("create table t(x)").unwrap(),
            StatementOutcome::Write(_)
        ));
        assert!(matches!(
            vault.execute("select * from t").unwrap(),
            StatementOutcome::Read(_)
        ));
    }

    #[test]
    fn restore_now_without_generations_is_false() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        assert!(!vault.restore_now().unwrap());
    }

    #[test]
    fn restore_now_updates_sync_state() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        let first = vault.execute_write("CREATE TABLE t(x)").unwrap();
        vault.execute_write("INSERT INTO t VALUES (1)").unwrap();
        fs::copy(
            vault.local_generations().slot_path(2),
            vault.local_generations().slot_path(1),
        )
        .unwrap();

        assert!(vault.restore_now().unwrap());
        assert_eq!(
            vault.current_sync_state().unwrap().fingerprint,
            Some(first.fingerprint)
        );
        assert!(vault.execute_read("SELECT * FROM t").unwrap().is_empty());
    }

    #[test]
    fn backup_now_rotates_even_without_change() {
        let temp = tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        let vault = open_vault(temp.path(), Arc::clone(&store) as Arc<dyn ObjectStore>);

        let first = vault.backup_now().unwrap();
        let second = vault.backup_now().unwrap();

        assert!(second.remote_synced);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(vault.local_generations().list().unwrap().len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remote_failure_is_not_fatal() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));

        let outcome = vault.execute_write("CREATE TABLE t(x)").unwrap();

        assert!(outcome.changed);
        assert!(vault.local_generations().slot_path(1).exists());
        assert_eq!(vault.stats().remote_rotation_failures, 1);
    }

    #[test]
    fn users_round_trip() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));

        assert!(vault.ensure_user("admin", "s3cret").unwrap());
        assert!(!vault.ensure_user("admin", "other").unwrap());
        assert!(vault.verify_credentials("admin", "s3cret").unwrap());
        assert!(!vault.verify_credentials("admin", "other").unwrap());
        assert!(!vault.verify_credentials("ghost", "s3cret").unwrap());
        assert_eq!(vault.user_count().unwrap(), 1);
    }

    #[test]
    fn status_reports_database_and_generations() {
        let temp = tempdir().unwrap();
        let vault = open_vault(temp.path(), Arc::new(DisabledObjectStore));
        vault.ensure_user("admin", "pw").unwrap();

        let status = vault.status().unwrap();

        assert!(status.exists);
        assert!(status.size.unwrap() > 0);
        assert_eq!(status.user_count, Some(1));
        assert_eq!(status.generations.len(), 1);
        assert_eq!(status.stats.recoveries, 1);
    }
}
