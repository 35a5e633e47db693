//! Directory-backed object store.
//!
//! Each object is one file inside the store directory, named
//! `<id>.<object name>` where `<id>` is a zero-padded upload counter:
//!
//! ```text
//! <root>/
//! ├─ 0000000001.db_2.sqlite
//! ├─ 0000000002.db_1.sqlite
//! └─ .0000000003.upload     # in-flight upload, renamed into place when complete
//! ```
//!
//! The id prefix stays fixed across renames, so the id order is the upload
//! order and several objects may carry the same name. This makes a mounted
//! network share behave like a folder in a hosted drive.

use crate::error::{RemoteError, RemoteResult};
use crate::store::{copy_chunked, ObjectId, ObjectInfo, ObjectStore};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const ID_WIDTH: usize = 10;
const UPLOAD_SUFFIX: &str = ".upload";

/// An object store whose folder is a local or mounted directory.
///
/// # Example
///
/// ```no_run
/// use litevault_remote::{DirectoryObjectStore, ObjectStore};
/// use std::path::Path;
///
/// let store = DirectoryObjectStore::open(Path::new("/mnt/backups")).unwrap();
/// store.upload("db_1.sqlite", &mut &b"snapshot"[..]).unwrap();
/// ```
#[derive(Debug)]
pub struct DirectoryObjectStore {
    root: PathBuf,
    /// Serializes id allocation and renames within this process.
    guard: Mutex<()>,
}

impl DirectoryObjectStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> RemoteResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(RemoteError::unavailable(format!(
                "store root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            guard: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(name: &str) -> RemoteResult<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(RemoteError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid object name: {name:?}"),
            )));
        }
        Ok(())
    }

    fn parse_entry(file_name: &str) -> Option<(u64, &str)> {
        let (id, name) = file_name.split_once('.')?;
        if id.len() != ID_WIDTH {
            return None;
        }
        Some((id.parse().ok()?, name))
    }

    /// Lists `(id, name, path)` for every complete object, in id order.
    fn entries(&self) -> RemoteResult<Vec<(u64, String, PathBuf)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some((id, name)) = Self::parse_entry(file_name) {
                entries.push((id, name.to_string(), entry.path()));
            }
        }
        entries.sort_by_key(|(id, _, _)| *id);
        Ok(entries)
    }

    fn path_of(&self, id: &ObjectId) -> RemoteResult<PathBuf> {
        let wanted: u64 = id
            .as_str()
            .parse()
            .map_err(|_| RemoteError::NotFound(id.to_string()))?;
        self.entries()?
            .into_iter()
            .find(|(key, _, _)| *key == wanted)
            .map(|(_, _, path)| path)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn object_path(&self, id: u64, name: &str) -> PathBuf {
        self.root.join(format!("{id:0width$}.{name}", width = ID_WIDTH))
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>> {
        for (id, entry_name, path) in self.entries()? {
            if entry_name == name {
                let size = fs::metadata(&path)?.len();
                return Ok(Some(ObjectInfo {
                    id: ObjectId::new(format!("{id:0width$}", width = ID_WIDTH)),
                    name: entry_name,
                    size,
                }));
            }
        }
        Ok(None)
    }

    fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64> {
        let path = self.path_of(id)?;
        let mut reader = BufReader::new(File::open(path)?);
        copy_chunked(&mut reader, sink)
    }

    fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId> {
        Self::validate_name(name)?;
        let _guard = self.guard.lock();

        let id = self
            .entries()?
            .last()
            .map(|(id, _, _)| id + 1)
            .unwrap_or(1);
        let temp_path = self
            .root
            .join(format!(".{id:0width$}{UPLOAD_SUFFIX}", width = ID_WIDTH));

        let written = {
            let mut file = File::create(&temp_path)?;
            let written = copy_chunked(source, &mut file);
            if written.is_ok() {
                file.sync_all()?;
            }
            written
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, self.object_path(id, name))?;
        debug!(id, name, "stored object");
        Ok(ObjectId::new(format!("{id:0width$}", width = ID_WIDTH)))
    }

    fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()> {
        Self::validate_name(new_name)?;
        let _guard = self.guard.lock();
        let path = self.path_of(id)?;
        let key: u64 = id
            .as_str()
            .parse()
            .map_err(|_| RemoteError::NotFound(id.to_string()))?;
        fs::rename(path, self.object_path(key, new_name))?;
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> RemoteResult<()> {
        let _guard = self.guard.lock();
        let path = self.path_of(id)?;
        fs::remove_file(path)?;
        Ok(())
    }
}
