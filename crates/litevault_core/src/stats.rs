//! In-process counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the orchestrator and recovery engine.
#[derive(Debug, Default)]
pub(crate) struct VaultCounters {
    writes: AtomicU64,
    unchanged_writes: AtomicU64,
    rotations: AtomicU64,
    local_failures: AtomicU64,
    remote_failures: AtomicU64,
    recoveries: AtomicU64,
}

/// Snapshot of the counters since the vault was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    /// Committed writes.
    pub writes: u64,
    /// Committed writes that left the content unchanged.
    pub unchanged_writes: u64,
    /// Rotation cycles started after a content change or manual backup.
    pub rotations: u64,
    /// Local rotations that failed.
    pub local_rotation_failures: u64,
    /// Remote rotations that failed.
    pub remote_rotation_failures: u64,
    /// Completed recovery runs.
    pub recoveries: u64,
}

impl VaultCounters {
    pub(crate) fn record_write(&self, changed: bool) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if !changed {
            self.unchanged_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rotation(&self, local_ok: bool, remote_ok: Option<bool>) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        if !local_ok {
            self.local_failures.fetch_add(1, Ordering::Relaxed);
        }
        if remote_ok == Some(false) {
            self.remote_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> VaultStats {
        VaultStats {
            writes: self.writes.load(Ordering::Relaxed),
            unchanged_writes: self.unchanged_writes.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            local_rotation_failures: self.local_failures.load(Ordering::Relaxed),
            remote_rotation_failures: self.remote_failures.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = VaultCounters::default();
        counters.record_write(true);
        counters.record_write(false);
        counters.record_rotation(true, Some(false));
        counters.record_rotation(false, None);
        counters.record_recovery();

        let stats = counters.snapshot();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.unchanged_writes, 1);
        assert_eq!(stats.rotations, 2);
        assert_eq!(stats.local_rotation_failures, 1);
        assert_eq!(stats.remote_rotation_failures, 1);
        assert_eq!(stats.recoveries, 1);
    }
}
