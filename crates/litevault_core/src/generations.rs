//! Local generation store.
//!
//! Keeps up to `N` numbered copies of the database file in the backup
//! directory. Slot 1 is always the newest copy and slot `N` the oldest.
//!
//! # Invariants
//!
//! - At most `N` generation files exist after any rotation.
//! - Rotation shifts slot `i` into slot `i + 1` from the bottom up, so a
//!   source is never overwritten before it has been copied downstream.
//! - Every copy is whole-file: a generation is either fully written or
//!   not present under its final name.

use crate::error::CoreResult;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// Metadata about one retained local generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationInfo {
    /// Slot number, 1 = newest.
    pub slot: usize,
    /// File path of the generation.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time as Unix seconds, if the platform reports one.
    pub modified: Option<f64>,
}

/// Numbered local backup copies of the database file.
#[derive(Debug, Clone)]
pub struct LocalGenerations {
    dir: PathBuf,
    prefix: String,
    count: usize,
}

impl LocalGenerations {
    /// Creates a store of `count` slots named `<prefix>_<slot>.sqlite`
    /// inside `dir`. The directory is created on first rotation.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, count: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            count,
        }
    }

    /// Returns the backup directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of retained slots.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns the path of `slot` (1-based), whether or not it exists.
    #[must_use]
    pub fn slot_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("{}_{slot}.sqlite", self.prefix))
    }

    /// Shifts every generation down one slot and copies `current` into
    /// slot 1. Whatever was in slot `N` is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Io`] if any delete or copy fails. Slots
    /// already shifted stay shifted; slot 1 is only written last.
    pub fn rotate(&self, current: &Path) -> CoreResult<()> {
        fs::create_dir_all(&self.dir)?;

        let oldest = self.slot_path(self.count);
        match fs::remove_file(&oldest) {
            Ok(()) => debug!(slot = self.count, "discarded oldest local generation"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        for slot in (1..self.count).rev() {
            let source = self.slot_path(slot);
            if source.exists() {
                copy_preserving(&source, &self.slot_path(slot + 1))?;
                debug!(from = slot, to = slot + 1, "shifted local generation");
            }
        }

        copy_preserving(current, &self.slot_path(1))?;
        info!(dir = %self.dir.display(), slots = self.count, "local generations rotated");
        Ok(())
    }

    /// Copies the newest existing generation onto `dest`.
    ///
    /// Returns `false`, leaving `dest` untouched, if no generation exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn restore_latest(&self, dest: &Path) -> CoreResult<bool> {
        let Some(slot) = (1..=self.count).find(|&slot| self.slot_path(slot).exists()) else {
            info!(dir = %self.dir.display(), "no local generation to restore");
            return Ok(false);
        };

        copy_preserving(&self.slot_path(slot), dest)?;
        info!(slot, dest = %dest.display(), "restored local generation");
        Ok(true)
    }

    /// Lists existing generations, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a generation's metadata cannot be read.
    pub fn list(&self) -> CoreResult<Vec<GenerationInfo>> {
        let mut generations = Vec::new();
        for slot in 1..=self.count {
            let path = self.slot_path(slot);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|since| since.as_secs_f64());
            generations.push(GenerationInfo {
                slot,
                path,
                size: metadata.len(),
                modified,
            });
        }
        Ok(generations)
    }
}

/// Copies `src` to `dst` through a temporary sibling, carrying over the
/// modification time, then renames it into place.
pub(crate) fn copy_preserving(src: &Path, dst: &Path) -> io::Result<()> {
    let mut staging: OsString = dst.as_os_str().to_os_string();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    let result = (|| {
        fs::copy(src, &staging)?;
        let modified = fs::metadata(src)?.modified()?;
        let file = File::options().write(true).open(&staging)?;
        file.set_modified(modified)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, dst)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}
