//! Persisted sync state.
//!
//! The last synced fingerprint and timestamp live in two plain-text
//! sidecar files next to the database, so they survive restarts:
//!
//! ```text
//! app.sqlite.hash   # hex fingerprint, no trailing newline
//! app.sqlite.ts     # Unix seconds as a decimal float
//! ```

use crate::error::CoreResult;
use crate::fingerprint::Fingerprint;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Last fingerprint and time at which a backup rotation was triggered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncState {
    /// Fingerprint of the database when it was last synced.
    pub fingerprint: Option<Fingerprint>,
    /// Unix time in seconds of the last sync.
    pub timestamp: Option<f64>,
}

/// Reads and writes the sync state sidecar files.
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    hash_path: PathBuf,
    timestamp_path: PathBuf,
}

impl SyncStateStore {
    /// Creates a store over the given sidecar paths.
    #[must_use]
    pub fn new(hash_path: &Path, timestamp_path: &Path) -> Self {
        Self {
            hash_path: hash_path.to_path_buf(),
            timestamp_path: timestamp_path.to_path_buf(),
        }
    }

    /// Loads the persisted state. Missing files yield empty fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a sidecar exists but cannot be read.
    pub fn load(&self) -> CoreResult<SyncState> {
        let fingerprint = read_trimmed(&self.hash_path)?
            .filter(|hex| !hex.is_empty())
            .map(Fingerprint::from_hex);

        let timestamp = match read_trimmed(&self.timestamp_path)? {
            None => None,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(path = %self.timestamp_path.display(), raw, "ignoring unparsable sync timestamp");
                    None
                }
            },
        };

        Ok(SyncState {
            fingerprint,
            timestamp,
        })
    }

    /// Returns only the last persisted fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar exists but cannot be read.
    pub fn last_fingerprint(&self) -> CoreResult<Option<Fingerprint>> {
        Ok(self.load()?.fingerprint)
    }

    /// Persists a new fingerprint and timestamp.
    ///
    /// Each sidecar is replaced atomically (write temp, sync, rename).
    ///
    /// # Errors
    ///
    /// Returns an error if either sidecar cannot be written.
    pub fn save(&self, fingerprint: &Fingerprint, timestamp: f64) -> CoreResult<()> {
        write_atomic(&self.hash_path, fingerprint.as_str().as_bytes())?;
        write_atomic(&self.timestamp_path, timestamp.to_string().as_bytes())?;
        Ok(())
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn read_trimmed(path: &Path) -> CoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let mut temp: OsString = path.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> SyncStateStore {
        SyncStateStore::new(&dir.join("db.sqlite.hash"), &dir.join("db.sqlite.ts"))
    }

    #[test]
    fn missing_sidecars_load_empty() {
        let temp = tempdir().unwrap();
        let state = store_in(temp.path()).load().unwrap();
        assert_eq!(state, SyncState::default());
    }

    #[test]
    fn save_then_load() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        let fp = Fingerprint::from_hex("abc123");

        store.save(&fp, 1_700_000_000.25).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.fingerprint, Some(fp));
        assert_eq!(state.timestamp, Some(1_700_000_000.25));
        assert!(!temp.path().join("db.sqlite.hash.tmp").exists());
    }

    #[test]
    fn survives_new_store_instance() {
        let temp = tempdir().unwrap();
        store_in(temp.path())
            .save(&Fingerprint::from_hex("feed"), 42.0)
            .unwrap();

        let reopened = store_in(temp.path());
        assert_eq!(
            reopened.last_fingerprint().unwrap(),
            Some(Fingerprint::from_hex("feed"))
        );
    }

    #[test]
    fn garbage_timestamp_is_ignored() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("db.sqlite.ts"), "yesterday").unwrap();
        fs::write(temp.path().join("db.sqlite.hash"), "beef\n").unwrap();

        let state = store_in(temp.path()).load().unwrap();
        assert_eq!(state.timestamp, None);
        assert_eq!(state.fingerprint, Some(Fingerprint::from_hex("beef")));
    }

    #[test]
    fn unix_now_is_recent() {
        assert!(unix_now() > 1_600_000_000.0);
    }
}
