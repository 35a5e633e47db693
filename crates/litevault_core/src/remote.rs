//! Remote generation store.
//!
//! Mirrors the local rotation scheme against fixed object names in a
//! remote folder (`db_1.sqlite` newest ... `db_N.sqlite` oldest).
//!
//! Remote failures never escape this module: every error is logged and
//! turned into `false` / `None`, because the remote tier is a convenience
//! copy rather than the source of truth.
//!
//! A rotation is four independent remote calls (delete, renames, upload)
//! with no atomicity across them. If one fails midway the slots may be
//! left with a gap or a missing slot 1; the next rotation proceeds from
//! whatever names exist and skips the gaps.

use litevault_remote::{ObjectStore, RemoteResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upper bound on stale duplicates removed from the oldest slot per rotation.
const MAX_SWEEP: usize = 16;

/// Named generations in a remote object store.
#[derive(Clone)]
pub struct RemoteGenerations {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    count: usize,
}

impl std::fmt::Debug for RemoteGenerations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGenerations")
            .field("prefix", &self.prefix)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl RemoteGenerations {
    /// Creates a remote store of `count` slots named `<prefix>_<slot>.sqlite`.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, count: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            count,
        }
    }

    /// Returns the object name for `slot` (1-based).
    #[must_use]
    pub fn slot_name(&self, slot: usize) -> String {
        format!("{}_{slot}.sqlite", self.prefix)
    }

    /// Shifts the remote slots down by one and uploads `local_latest`
    /// (normally local slot 1) as the new slot 1.
    ///
    /// Returns `false` if any remote step failed; the error is logged.
    pub fn rotate(&self, local_latest: &Path) -> bool {
        match self.try_rotate(local_latest) {
            Ok(()) => {
                info!(slots = self.count, "remote generations rotated");
                true
            }
            Err(e) => {
                error!(error = %e, "remote rotation failed");
                false
            }
        }
    }

    fn try_rotate(&self, local_latest: &Path) -> RemoteResult<()> {
        let oldest = self.slot_name(self.count);
        for _ in 0..MAX_SWEEP {
            let Some(object) = self.store.find(&oldest)? else {
                break;
            };
            self.store.delete(&object.id)?;
            debug!(name = %oldest, id = %object.id, "deleted oldest remote generation");
        }

        for slot in (1..self.count).rev() {
            let name = self.slot_name(slot);
            match self.store.find(&name)? {
                Some(object) => {
                    self.store.rename(&object.id, &self.slot_name(slot + 1))?;
                    debug!(from = slot, to = slot + 1, "shifted remote generation");
                }
                None => debug!(slot, "remote slot empty, skipping"),
            }
        }

        let mut source = File::open(local_latest)?;
        let id = self.store.upload(&self.slot_name(1), &mut source)?;
        debug!(%id, "uploaded newest remote generation");
        Ok(())
    }

    /// Downloads remote slot 1 onto `dest`.
    ///
    /// The object is streamed into a temporary sibling and renamed over
    /// `dest` only once complete. Returns `None` if there is no remote
    /// generation or any step fails.
    pub fn fetch_latest(&self, dest: &Path) -> Option<PathBuf> {
        let name = self.slot_name(1);
        let object = match self.store.find(&name) {
            Ok(Some(object)) => object,
            Ok(None) => {
                info!(%name, "no remote generation available");
                return None;
            }
            Err(e) => {
                error!(error = %e, %name, "remote lookup failed");
                return None;
            }
        };

        let mut staging: OsString = dest.as_os_str().to_os_string();
        staging.push(".download");
        let staging = PathBuf::from(staging);

        match self.download_to(&object.id, &staging, dest) {
            Ok(bytes) => {
                info!(%name, bytes, dest = %dest.display(), "fetched remote generation");
                Some(dest.to_path_buf())
            }
            Err(e) => {
                error!(error = %e, %name, "remote download failed");
                if let Err(cleanup) = fs::remove_file(&staging) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %cleanup, path = %staging.display(), "could not remove partial download");
                    }
                }
                None
            }
        }
    }

    fn download_to(
        &self,
        id: &litevault_remote::ObjectId,
        staging: &Path,
        dest: &Path,
    ) -> RemoteResult<u64> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut sink = BufWriter::new(File::create(staging)?);
        let bytes = self.store.download(id, &mut sink)?;
        let file = sink.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(staging, dest)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litevault_remote::{
        DisabledObjectStore, InMemoryObjectStore, ObjectId, ObjectInfo, TimeoutObjectStore,
    };
    use std::io::{Read, Write};
    use std::time::Duration;
    use tempfile::tempdir;

    fn remote(store: &Arc<InMemoryObjectStore>, count: usize) -> RemoteGenerations {
        RemoteGenerations::new(Arc::clone(store) as Arc<dyn ObjectStore>, "db", count)
    }

    #[test]
    fn rotation_shifts_named_slots() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("db_1.sqlite");
        let store = Arc::new(InMemoryObjectStore::new());
        let generations = remote(&store, 3);

        for version in ["v1", "v2", "v3", "v4"] {
            fs::write(&local, version).unwrap();
            assert!(generations.rotate(&local));
        }

        assert_eq!(store.len(), 3);
        assert_eq!(store.contents("db_1.sqlite").unwrap(), b"v4");
        assert_eq!(store.contents("db_2.sqlite").unwrap(), b"v3");
        assert_eq!(store.contents("db_3.sqlite").unwrap(), b"v2");
    }

    #[test]
    fn rotation_removes_stale_duplicates_of_oldest() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("db_1.sqlite");
        fs::write(&local, b"new").unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        store.upload("db_2.sqlite", &mut &b"a"[..]).unwrap();
        store.upload("db_2.sqlite", &mut &b"b"[..]).unwrap();
        store.upload("db_1.sqlite", &mut &b"old"[..]).unwrap();

        assert!(remote(&store, 2).rotate(&local));

        let mut names = store.names();
        names.sort();
        assert_eq!(names, vec!["db_1.sqlite", "db_2.sqlite"]);
        assert_eq!(store.contents("db_2.sqlite").unwrap(), b"old");
        assert_eq!(store.contents("db_1.sqlite").unwrap(), b"new");
    }

    /// In-memory store whose renames take longer than the deadline.
    struct SlowRenames(Arc<InMemoryObjectStore>);

    impl ObjectStore for SlowRenames {
        fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>> {
            self.0.find(name)
        }

        fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64> {
            self.0.download(id, sink)
        }

        fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId> {
            self.0.upload(name, source)
        }

        fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.rename(id, new_name)
        }

        fn delete(&self, id: &ObjectId) -> RemoteResult<()> {
            self.0.delete(id)
        }
    }

    #[test]
    fn timed_out_rotation_leaves_no_work_in_flight() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("db_1.sqlite");
        fs::write(&local, b"new").unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        store.upload("db_1.sqlite", &mut &b"old"[..]).unwrap();
        let bounded = TimeoutObjectStore::new(
            SlowRenames(Arc::clone(&store)),
            Duration::from_millis(50),
        );
        let generations = RemoteGenerations::new(Arc::new(bounded), "db", 3);

        assert!(!generations.rotate(&local));
        let settled = store.names();

        std::thread::sleep(Duration::from_millis(500));
        assert_eq!(store.names(), settled);
        assert_eq!(settled, vec!["db_2.sqlite"]);
    }

    #[test]
    fn rotation_failure_is_reported_not_raised() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("db_1.sqlite");
        fs::write(&local, b"data").unwrap();
        let generations = RemoteGenerations::new(Arc::new(DisabledObjectStore), "db", 3);

        assert!(!generations.rotate(&local));
    }

    #[test]
    fn fetch_latest_downloads_slot_one() {
        let temp = tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        store.upload("db_2.sqlite", &mut &b"older"[..]).unwrap();
        store.upload("db_1.sqlite", &mut &b"newest"[..]).unwrap();

        let dest = temp.path().join("data").join("app.sqlite");
        let fetched = remote(&store, 3).fetch_latest(&dest);

        assert_eq!(fetched.as_deref(), Some(dest.as_path()));
        assert_eq!(fs::read(&dest).unwrap(), b"newest");
    }

    #[test]
    fn fetch_latest_without_object_is_none() {
        let temp = tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        let dest = temp.path().join("app.sqlite");

        assert!(remote(&store, 3).fetch_latest(&dest).is_none());
        assert!(!dest.exists());
    }

    #[test]
    fn fetch_latest_failure_is_none_and_keeps_dest() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("app.sqlite");
        fs::write(&dest, b"local").unwrap();
        let generations = RemoteGenerations::new(Arc::new(DisabledObjectStore), "db", 3);

        assert!(generations.fetch_latest(&dest).is_none());
        assert_eq!(fs::read(&dest).unwrap(), b"local");
    }
}
