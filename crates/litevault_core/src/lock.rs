//! File lock guard.
//!
//! Every operation that mutates or replaces the database file runs inside
//! a guarded section obtained from [`FileLock::acquire`]. The guard layers
//! two locks:
//!
//! 1. an in-process `RwLock` gate, so threads of this process queue up
//!    without touching the filesystem, and
//! 2. an OS advisory lock on the sentinel file (via `fs2`), so other
//!    processes sharing the same mount are excluded too.
//!
//! Readers may take a [`SharedGuard`] instead; any number of readers run
//! together, but never alongside an exclusive section.
//!
//! Guards release both locks when dropped, including during unwinding.
//! Guarded sections are not re-entrant: acquiring again on a thread that
//! already holds a guard deadlocks.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Process-wide and cross-process mutual exclusion for the database file.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    gate: RwLock<()>,
    timeout: Option<Duration>,
}

/// Exclusive guarded section. Dropping it releases the lock.
#[derive(Debug)]
pub struct ExclusiveGuard<'a> {
    file: File,
    _gate: RwLockWriteGuard<'a, ()>,
}

/// Shared (reader) section. Dropping it releases the lock.
#[derive(Debug)]
pub struct SharedGuard<'a> {
    file: File,
    _gate: RwLockReadGuard<'a, ()>,
}

impl FileLock {
    /// Creates a lock on the sentinel file at `path`.
    ///
    /// With `timeout` set to `None`, acquisition waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the sentinel's parent directory cannot be created.
    pub fn new(path: &Path, timeout: Option<Duration>) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            gate: RwLock::new(()),
            timeout,
        })
    }

    /// Returns the sentinel file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enters an exclusive guarded section, blocking until it is available.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if a timeout is configured and
    /// expires, or an I/O error if the sentinel cannot be opened or locked.
    pub fn acquire(&self) -> CoreResult<ExclusiveGuard<'_>> {
        let started = Instant::now();
        let gate = match self.timeout {
            None => self.gate.write(),
            Some(timeout) => self
                .gate
                .try_write_for(timeout)
                .ok_or(CoreError::LockTimeout(timeout))?,
        };

        let file = self.open_sentinel()?;
        self.lock_file(&file, started, |f| FileExt::lock_exclusive(f), |f| {
            FileExt::try_lock_exclusive(f)
        })?;

        debug!(path = %self.path.display(), "acquired exclusive lock");
        Ok(ExclusiveGuard { file, _gate: gate })
    }

    /// Enters a shared section for readers.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub fn acquire_shared(&self) -> CoreResult<SharedGuard<'_>> {
        let started = Instant::now();
        let gate = match self.timeout {
            None => self.gate.read(),
            Some(timeout) => self
                .gate
                .try_read_for(timeout)
                .ok_or(CoreError::LockTimeout(timeout))?,
        };

        let file = self.open_sentinel()?;
        self.lock_file(&file, started, |f| FileExt::lock_shared(f), |f| {
            FileExt::try_lock_shared(f)
        })?;

        Ok(SharedGuard { file, _gate: gate })
    }

    fn open_sentinel(&self) -> CoreResult<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        Ok(file)
    }

    fn lock_file(
        &self,
        file: &File,
        started: Instant,
        blocking: impl Fn(&File) -> io::Result<()>,
        non_blocking: impl Fn(&File) -> io::Result<()>,
    ) -> CoreResult<()> {
        let Some(timeout) = self.timeout else {
            blocking(file)?;
            return Ok(());
        };

        loop {
            match non_blocking(file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || is_contended(&e) => {
                    if started.elapsed() >= timeout {
                        warn!(path = %self.path.display(), ?timeout, "lock wait timed out");
                        return Err(CoreError::LockTimeout(timeout));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// `fs2` reports contention with a platform error rather than `WouldBlock`
/// on some systems.
fn is_contended(error: &io::Error) -> bool {
    error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("failed to release exclusive lock: {}", e);
        }
    }
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("failed to release shared lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_sentinel() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("db.lock");
        let lock = FileLock::new(&path, None).unwrap();

        let guard = lock.acquire().unwrap();
        assert!(path.exists());
        drop(guard);
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.lock");
        let lock = FileLock::new(&path, Some(Duration::from_millis(200))).unwrap();

        {
            let _guard = lock.acquire().unwrap();
        }
        let _again = lock.acquire().unwrap();
    }

    #[test]
    fn second_holder_times_out() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.lock");
        // Two independent locks on one sentinel behave like two processes.
        let first = FileLock::new(&path, None).unwrap();
        let second = FileLock::new(&path, Some(Duration::from_millis(100))).unwrap();

        let _held = first.acquire().unwrap();
        let result = second.acquire();
        assert!(matches!(result, Err(CoreError::LockTimeout(_))));
    }

    #[test]
    fn shared_guards_coexist_but_block_writers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.lock");
        let lock = FileLock::new(&path, None).unwrap();
        let other = FileLock::new(&path, Some(Duration::from_millis(100))).unwrap();

        let _r1 = lock.acquire_shared().unwrap();
        let _r2 = other.acquire_shared().unwrap();
        assert!(matches!(other.acquire(), Err(CoreError::LockTimeout(_))));
    }

    #[test]
    fn released_after_panic() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.lock");
        let lock = Arc::new(FileLock::new(&path, Some(Duration::from_secs(1))).unwrap());

        let held = Arc::clone(&lock);
        let result = thread::spawn(move || {
            let _guard = held.acquire().unwrap();
            panic!("fail inside guarded section");
        })
        .join();
        assert!(result.is_err());

        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn sections_are_serialized() {
        let temp = tempdir().unwrap();
        let lock = Arc::new(FileLock::new(&temp.path().join("db.lock"), None).unwrap());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = lock.acquire().unwrap();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
