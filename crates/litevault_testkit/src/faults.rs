//! Fault injection for the remote object store.
//!
//! [`FlakyObjectStore`] forwards to an inner store until a fault is
//! armed, after which the selected calls fail with the chosen error.

use litevault_remote::{ObjectId, ObjectInfo, ObjectStore, RemoteError, RemoteResult};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The error an armed fault produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Network failure or refused request.
    Unavailable,
    /// Rejected credentials.
    Unauthorized,
    /// Out of quota.
    QuotaExceeded,
}

impl FaultKind {
    fn error(self) -> RemoteError {
        match self {
            FaultKind::Unavailable => RemoteError::unavailable("injected fault"),
            FaultKind::Unauthorized => RemoteError::Unauthorized("injected fault".into()),
            FaultKind::QuotaExceeded => RemoteError::QuotaExceeded("injected fault".into()),
        }
    }
}

/// Which calls an armed fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    /// Every call.
    All,
    /// `upload`, `rename` and `delete`; lookups and downloads still work.
    Mutations,
    /// `find` and `download` only.
    Reads,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    kind: FaultKind,
    scope: FaultScope,
}

/// An object store that fails on demand.
pub struct FlakyObjectStore {
    inner: Arc<dyn ObjectStore>,
    armed: Mutex<Option<Armed>>,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl FlakyObjectStore {
    /// Wraps `inner`; no fault is armed initially.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Makes every call in `scope` fail with `kind`.
    pub fn arm(&self, kind: FaultKind, scope: FaultScope) {
        *self.armed.lock() = Some(Armed { kind, scope });
    }

    /// Makes every call fail as unavailable.
    pub fn go_offline(&self) {
        self.arm(FaultKind::Unavailable, FaultScope::All);
    }

    /// Clears any armed fault.
    pub fn heal(&self) {
        *self.armed.lock() = None;
    }

    /// Total calls seen, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Calls that failed because of an injected fault.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn check(&self, mutation: bool) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let Some(armed) = *self.armed.lock() else {
            return Ok(());
        };
        let applies = match armed.scope {
            FaultScope::All => true,
            FaultScope::Mutations => mutation,
            FaultScope::Reads => !mutation,
        };
        if applies {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(armed.kind.error());
        }
        Ok(())
    }
}

impl ObjectStore for FlakyObjectStore {
    fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>> {
        self.check(false)?;
        self.inner.find(name)
    }

    fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64> {
        self.check(false)?;
        self.inner.download(id, sink)
    }

    fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId> {
        self.check(true)?;
        self.inner.upload(name, source)
    }

    fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()> {
        self.check(true)?;
        self.inner.rename(id, new_name)
    }

    fn delete(&self, id: &ObjectId) -> RemoteResult<()> {
        self.check(true)?;
        self.inner.delete(id)
    }
}
