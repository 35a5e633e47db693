//! Database validation and initialization.

use crate::credentials::CREDENTIAL_TABLE_SQL;
use crate::error::{CoreError, CoreResult};
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// SQLite sidecar suffixes that belong to the database file.
const SQLITE_SIDECARS: [&str; 3] = ["-journal", "-wal", "-shm"];

/// How a connection may touch the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    ReadOnly,
    ReadWrite,
}

/// Opens the existing database file. Never creates it.
pub(crate) fn open(path: &Path, access: Access, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let mode = match access {
        Access::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        Access::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
    };
    let conn = Connection::open_with_flags(path, mode | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

/// Returns the names of all tables in the database.
pub(crate) fn list_tables(conn: &Connection) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(names)
}

/// Checks that `path` is a readable SQLite database containing every
/// table in `required`.
///
/// # Errors
///
/// Returns [`CoreError::Schema`] if the file cannot be opened or read as
/// a database, or if any required table is missing.
pub fn validate(path: &Path, required: &[String], busy_timeout: Duration) -> CoreResult<()> {
    let conn = open(path, Access::ReadOnly, busy_timeout)
        .map_err(|e| CoreError::schema(format!("cannot open {}: {e}", path.display())))?;
    let present = list_tables(&conn)
        .map_err(|e| CoreError::schema(format!("unreadable database {}: {e}", path.display())))?;

    let missing: Vec<&str> = required
        .iter()
        .filter(|table| !present.contains(table.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::schema(format!(
            "missing required tables: {}",
            missing.join(", ")
        )));
    }

    debug!(path = %path.display(), tables = present.len(), "database validated");
    Ok(())
}

/// Replaces whatever is at `path` with a fresh database.
///
/// Any existing file and its SQLite journals are removed first. The new
/// database is initialized with `schema_sql`, or with only the credential
/// table when no schema is given.
///
/// # Errors
///
/// Returns an error if the old file cannot be removed or the new one
/// cannot be created or initialized.
pub fn create_empty(path: &Path, schema_sql: Option<&str>, busy_timeout: Duration) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    remove_if_exists(path)?;
    discard_journals(path)?;

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(schema_sql.unwrap_or(CREDENTIAL_TABLE_SQL))?;
    conn.close().map_err(|(_, e)| CoreError::Database(e))?;

    info!(path = %path.display(), custom_schema = schema_sql.is_some(), "created empty database");
    Ok(())
}

/// Removes SQLite journal files next to `db_path`.
///
/// Called after the main file is replaced wholesale, so a journal left by
/// the previous file is never replayed into the new one.
pub(crate) fn discard_journals(db_path: &Path) -> io::Result<()> {
    for suffix in SQLITE_SIDECARS {
        let mut raw: OsString = db_path.as_os_str().to_os_string();
        raw.push(suffix);
        remove_if_exists(&PathBuf::from(raw))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
