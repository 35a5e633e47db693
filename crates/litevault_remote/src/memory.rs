//! In-memory object store for testing.

use crate::error::{RemoteError, RemoteResult};
use crate::store::{copy_chunked, ObjectId, ObjectInfo, ObjectStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{Read, Write};

#[derive(Debug, Clone)]
struct StoredObject {
    name: String,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    objects: BTreeMap<u64, StoredObject>,
}

/// An in-memory object store.
///
/// Ids are assigned in upload order, so [`find`](ObjectStore::find)
/// returning the lowest id matches the "oldest object wins" contract.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use litevault_remote::{InMemoryObjectStore, ObjectStore};
///
/// let store = InMemoryObjectStore::new();
/// let id = store.upload("db_1.sqlite", &mut &b"snapshot"[..]).unwrap();
/// assert_eq!(store.find("db_1.sqlite").unwrap().unwrap().id, id);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    inner: RwLock<Inner>,
}

impl InMemoryObjectStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all stored objects in id order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .objects
            .values()
            .map(|object| object.name.clone())
            .collect()
    }

    /// Returns the content of the first object with the given name.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .read()
            .objects
            .values()
            .find(|object| object.name == name)
            .map(|object| object.data.clone())
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(id: &ObjectId) -> RemoteResult<u64> {
        id.as_str()
            .strip_prefix("mem-")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn find(&self, name: &str) -> RemoteResult<Option<ObjectInfo>> {
        let inner = self.inner.read();
        Ok(inner
            .objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(key, object)| ObjectInfo {
                id: ObjectId::new(format!("mem-{key}")),
                name: object.name.clone(),
                size: object.data.len() as u64,
            }))
    }

    fn download(&self, id: &ObjectId, sink: &mut dyn Write) -> RemoteResult<u64> {
        let key = Self::key(id)?;
        let data = self
            .inner
            .read()
            .objects
            .get(&key)
            .map(|object| object.data.clone())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        copy_chunked(&mut data.as_slice(), sink)
    }

    fn upload(&self, name: &str, source: &mut dyn Read) -> RemoteResult<ObjectId> {
        let mut data = Vec::new();
        copy_chunked(source, &mut data)?;

        let mut inner = self.inner.write();
        inner.next_id += 1;
        let key = inner.next_id;
        inner.objects.insert(
            key,
            StoredObject {
                name: name.to_string(),
                data,
            },
        );
        Ok(ObjectId::new(format!("mem-{key}")))
    }

    fn rename(&self, id: &ObjectId, new_name: &str) -> RemoteResult<()> {
        let key = Self::key(id)?;
        let mut inner = self.inner.write();
        let object = inner
            .objects
            .get_mut(&key)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        object.name = new_name.to_string();
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> RemoteResult<()> {
        let key = Self::key(id)?;
        self.inner
            .write()
            .objects
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryObjectStore::new();
        assert!(store.is_empty());
        assert!(store.find("db_1.sqlite").unwrap().is_none());
    }

    #[test]
    fn memory_upload_then_download() {
        let store = InMemoryObjectStore::new();
        let id = store.upload("a", &mut &b"hello world"[..]).unwrap();

        let mut sink = Vec::new();
        let n = store.download(&id, &mut sink).unwrap();
        assert_eq!(n, 11);
        assert_eq!(sink, b"hello world");
    }

    #[test]
    fn memory_find_returns_oldest_duplicate() {
        let store = InMemoryObjectStore::new();
        let first = store.upload("dup", &mut &b"one"[..]).unwrap();
        store.upload("dup", &mut &b"two"[..]).unwrap();

        let found = store.find("dup").unwrap().unwrap();
        assert_eq!(found.id, first);
        assert_eq!(found.size, 3);
        assert_eq!(store.contents("dup").unwrap(), b"one");
    }

    #[test]
    fn memory_rename_changes_lookup_name() {
        let store = InMemoryObjectStore::new();
        let id = store.upload("old", &mut &b"x"[..]).unwrap();
        store.rename(&id, "new").unwrap();

        assert!(store.find("old").unwrap().is_none());
        assert_eq!(store.find("new").unwrap().unwrap().id, id);
    }

    #[test]
    fn memory_delete_removes_object() {
        let store = InMemoryObjectStore::new();
        let id = store.upload("gone", &mut &b"x"[..]).unwrap();
        store.delete(&id).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.delete(&id), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn memory_unknown_id_is_not_found() {
        let store = InMemoryObjectStore::new();
        let mut sink = Vec::new();
        let result = store.download(&ObjectId::new("bogus"), &mut sink);
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }
}
