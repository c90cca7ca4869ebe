//! # cmux-storage — Object Storage Backends
//!
//! Every repository's artifacts live in a single tenant-agnostic object
//! store. Namespace isolation is purely a matter of key prefixes: the
//! repository `org1/team1` owns the keys under `org1/team1/`.
//!
//! ## Backends
//!
//! - [`LocalFilesystemBackend`]: keys map to files under a root directory.
//! - [`MemoryBackend`]: a `BTreeMap` behind a lock, used in tests and for
//!   ephemeral servers.
//!
//! ## Crate Policy
//!
//! - The backend contract offers no transactions. Callers (the index cache)
//!   own ordering between writes and invalidation.
//! - Keys are validated before they touch the backend; `.`, `..` and empty
//!   segments are rejected with [`StorageError::InvalidKey`].

pub mod backend;
pub mod filesystem;
pub mod memory;

pub use backend::{validate_key, validate_prefix, Backend, DynBackend, Object, ObjectInfo, StorageError};
pub use filesystem::LocalFilesystemBackend;
pub use memory::MemoryBackend;
