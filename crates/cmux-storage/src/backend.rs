//! # Backend Contract
//!
//! The four operations every storage provider must supply. Listing uses
//! delimiter semantics: `list_objects("org1/")` returns `org1/a.tgz` but
//! not `org1/team1/a.tgz`, so each tenancy level sees only its own
//! objects.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object is stored under the key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key or prefix is malformed.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Underlying I/O failed.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Wrap an I/O error, mapping `NotFound` to [`StorageError::NotFound`].
    pub fn from_io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(key.to_string())
        } else {
            Self::Io {
                key: key.to_string(),
                source,
            }
        }
    }

    /// Whether this error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A listed object without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full key, including the listing prefix.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
    /// Final path segment of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// A fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Full key.
    pub key: String,
    /// Raw bytes.
    pub content: Vec<u8>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

/// Namespaced byte-blob store.
///
/// Implementations must be safe to share across request tasks. None of
/// the operations are transactional with respect to each other.
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Objects directly under `prefix`, sorted by key.
    ///
    /// `prefix` is empty or ends with `/`. A prefix with no objects yields
    /// an empty list, not an error.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Fetch one object, or [`StorageError::NotFound`].
    async fn get_object(&self, key: &str) -> Result<Object, StorageError>;

    /// Store an object, overwriting any existing one.
    async fn put_object(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;

    /// Delete an object, or [`StorageError::NotFound`].
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

/// Shared, type-erased backend.
pub type DynBackend = Arc<dyn Backend>;

fn segment_ok(segment: &str) -> bool {
    !(segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\'))
}

/// Validate an object key (`a/b/file.tgz`).
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.starts_with('/') || !key.split('/').all(segment_ok) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Validate a listing prefix (`""` or `a/b/`).
pub fn validate_prefix(prefix: &str) -> Result<(), StorageError> {
    if prefix.is_empty() {
        return Ok(());
    }
    match prefix.strip_suffix('/') {
        Some(dir) => validate_key(dir).map_err(|_| StorageError::InvalidKey(prefix.to_string())),
        None => Err(StorageError::InvalidKey(prefix.to_string())),
    }
}
