//! # LiteVault Remote
//!
//! Remote object store abstraction for LiteVault.
//!
//! The remote tier holds the off-machine copies of the database
//! generations. Stores are **named blob folders**: they list, download,
//! upload, rename and delete whole objects and know nothing about SQLite
//! or generation numbering. `litevault_core` owns all of that.
//!
//! ## Available Stores
//!
//! - [`InMemoryObjectStore`] - For testing
//! - [`DirectoryObjectStore`] - A local or mounted directory
//! - [`DisabledObjectStore`] - Placeholder when no remote is configured
//! - [`TimeoutObjectStore`] - Wraps another store with a per-call deadline
//!
//! ## Example
//!
//! ```rust
//! use litevault_remote::{InMemoryObjectStore, ObjectStore};
//!
//! let store = InMemoryObjectStore::new();
//! let id = store.upload("db_1.sqlite", &mut &b"hello"[..]).unwrap();
//! let mut out = Vec::new();
//! store.download(&id, &mut out).unwrap();
//! assert_eq!(out, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod memory;
mod store;
mod timeout;

pub use directory::DirectoryObjectStore;
pub use error::{RemoteError, RemoteResult};
pub use memory::InMemoryObjectStore;
pub use store::{DisabledObjectStore, ObjectId, ObjectInfo, ObjectStore, CHUNK_SIZE};
pub use timeout::TimeoutObjectStore;
