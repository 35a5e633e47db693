//! Deadline wrapper for object stores.

use crate::error::{RemoteError, RemoteResult};
use crate::store::{ObjectId, ObjectInfo, ObjectStore};
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Bounds every call on the wrapped store with a deadline.
///
/// Transfers run on the caller's thread and stream through the deadline:
/// once it passes, the next chunk read from an upload source or written to
/// a download sink fails, and the backend abandons the transfer. `rename`
/// and `delete` also run on the caller's thread; one that finishes after
/// its deadline is reported as [`RemoteError::Timeout`] even though it has
/// taken effect.
///
/// `find` changes nothing, so it alone runs on a helper thread that is
/// abandoned when the deadline passes.
///
/// # Invariants
///
/// No mutating call is still in flight when this store returns, so remote
/// mutations stay ordered behind whatever lock the caller holds.
pub struct TimeoutObjectStore<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S: ObjectStore + 'static> TimeoutObjectStore<S> {
    /// Wraps `inner` with the given per-call deadline.
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    /// Returns the per-call deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `f` on the caller's thread and maps a late or deadline-induced
    /// outcome to [`RemoteError::Timeout`].
    fn settle<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&S, Deadline) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let deadline = Deadline::after(self.timeout);
        let result = f(self.inner.as_ref(), deadline);
        if deadline.expired() {
            warn!(
                operation,
                timeout = ?self.timeout,
                succeeded = result.is_ok(),
                "remote call exceeded its deadline"
            );
            return Err(RemoteError::Timeout(self.timeout));
        }
        result
    }
}

impl<S: ObjectStore + 'static> ObjectStore for TimeoutObjectStore<S> {
    fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        thread::Builder::new()
            .name("remote-find".to_string())
            .spawn(move || {
                let _ = tx.send(inner.find(&name));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(operation = "find", timeout = ?self.timeout, "remote call exceeded its deadline");
                Err(RemoteError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RemoteError::unavailable(
                "remote find worker exited without a result",
            )),
        }
    }

    fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64> {
        self.settle("download", |store, deadline| {
            let mut sink = DeadlineWriter { inner: sink, deadline };
            store.download(id, &mut sink)
        })
    }

    fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId> {
        self.settle("upload", |store, deadline| {
            let mut source = DeadlineReader {
                inner: source,
                deadline,
            };
            store.upload(name, &mut source)
        })
    }

    fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()> {
        self.settle("rename", |store, _| store.rename(id, new_name))
    }

    fn delete(&self, id: &ObjectId) -> RemoteResult<()> {
        self.settle("delete", |store, _| store.delete(id))
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    fn expired(self) -> bool {
        Instant::now() >= self.0
    }

    fn check(self) -> io::Result<()> {
        if self.expired() {
            Err(io::Error::new(io::ErrorKind::TimedOut, "remote transfer deadline passed"))
        } else {
            Ok(())
        }
    }
}

struct DeadlineReader<'a> {
    inner: &'a mut dyn Read,
    deadline: Deadline,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.deadline.check()?;
        self.inner.read(buf)
    }
}

struct DeadlineWriter<'a> {
    inner: &'a mut dyn Write,
    deadline: Deadline,
}

impl Write for DeadlineWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.deadline.check()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
