//! Object store trait definition.

use crate::error::{RemoteError, RemoteResult};
use std::fmt;
use std::io::{Read, Write};

/// Chunk size used when streaming object content.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Opaque identifier assigned to an object by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wraps a store-specific identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata describing one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Store-assigned identifier.
    pub id: ObjectId,
    /// Object name within the folder.
    pub name: String,
    /// Content length in bytes.
    pub size: u64,
}

/// A remote object store scoped to a single logical folder.
///
/// Objects are addressed by name for lookup and by [`ObjectId`] for every
/// other operation. Several objects may share a name; [`find`](Self::find)
/// returns the oldest match.
///
/// # Invariants
///
/// - `upload` never replaces an existing object in place
/// - `download` writes exactly the bytes previously uploaded
/// - Implementations must be `Send + Sync` for use from request threads
///
/// # Implementors
///
/// - [`super::InMemoryObjectStore`] - For testing
/// - [`super::DirectoryObjectStore`] - Files inside a (possibly mounted) directory
/// - [`super::DisabledObjectStore`] - No remote configured
/// - [`super::TimeoutObjectStore`] - Deadline wrapper around another store
pub trait ObjectStore: Send + Sync {
    /// Looks up the first object with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>>;

    /// Streams the object's content into `sink`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the id is unknown, or an
    /// error if the transfer fails.
    fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64>;

    /// Stores the content of `source` as a new object named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the store refuses it.
    fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId>;

    /// Renames an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the id is unknown.
    fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()>;

    /// Deletes an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the id is unknown.
    fn delete(&self, id: &ObjectId) -> RemoteResult<()>;
}

/// Copies `source` into `sink` in [`CHUNK_SIZE`] pieces.
pub(crate) fn copy_chunked(source: &mut dyn Read, sink: &mut dyn Write) -> RemoteResult<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }
    sink.flush()?;
    Ok(total)
}

/// Store used when no remote is configured.
///
/// Every call fails with [`RemoteError::Unavailable`], which the recovery
/// and rotation paths already treat as a non-fatal condition.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledObjectStore;

impl DisabledObjectStore {
    fn refuse<T>() -> RemoteResult<T> {
        Err(RemoteError::unavailable("no remote object store configured"))
    }
}

impl ObjectStore for DisabledObjectStore {
    fn find(&self, _name: &str) -> RemoteResult<Option<ObjectInfo>> {
        Self::refuse()
    }

    fn download(&self, _id: &ObjectId, _sink: &mut dyn Write) -> RemoteResult<u64> {
        Self::refuse()
    }

    fn upload(&self, _name: &str, _source: &mut dyn Read) -> RemoteResult<ObjectId> {
        Self::refuse()
    }

    fn rename(&self, _id: &ObjectId, _new_name: &str) -> RemoteResult<()> {
        Self::refuse()
    }

    fn delete(&self, _id: &ObjectId) -> RemoteResult<()> {
        Self::refuse()
    }
}
