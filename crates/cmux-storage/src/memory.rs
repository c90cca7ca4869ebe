//! # In-Memory Backend
//!
//! A sorted map behind a `parking_lot::RwLock`. The lock is never held
//! across an `.await`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::backend::{validate_key, validate_prefix, Backend, Object, ObjectInfo, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    content: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Volatile object store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all prefixes.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        validate_prefix(prefix)?;
        let objects = self.objects.read();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, stored)| ObjectInfo {
                key: key.clone(),
                last_modified: stored.last_modified,
            })
            .collect())
    }

    async fn get_object(&self, key: &str) -> Result<Object, StorageError> {
        validate_key(key)?;
        self.objects
            .read()
            .get(key)
            .map(|stored| Object {
                key: key.to_string(),
                content: stored.content.clone(),
                last_modified: stored.last_modified,
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put_object(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                content: content.to_vec(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
