//! # Local Filesystem Backend
//!
//! Keys map to paths under a root directory: `org1/team1/a.tgz` is stored
//! at `{root}/org1/team1/a.tgz`. Writes go to a hidden temporary file in
//! the destination directory and are renamed into place, so a concurrent
//! reader sees either the old object or the new one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::{validate_key, validate_prefix, Backend, Object, ObjectInfo, StorageError};

/// Filesystem-backed object store rooted at a directory.
#[derive(Debug)]
pub struct LocalFilesystemBackend {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl LocalFilesystemBackend {
    /// Create a backend rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

fn modified_utc(modified: std::io::Result<SystemTime>) -> DateTime<Utc> {
    modified.map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl Backend for LocalFilesystemBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        validate_prefix(prefix)?;
        let dir = self.path_for(prefix);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io {
                    key: prefix.to_string(),
                    source: e,
                })
            }
        };

        let mut objects = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(prefix, e))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(prefix, name = ?raw, "skipping non-UTF-8 filename");
                    continue;
                }
            };
            // In-flight temporary files and other dotfiles are not objects.
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::from_io(prefix, e)),
            };
            if !metadata.is_file() {
                continue;
            }
            objects.push(ObjectInfo {
                key: format!("{prefix}{name}"),
                last_modified: modified_utc(metadata.modified()),
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn get_object(&self, key: &str) -> Result<Object, StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        Ok(Object {
            key: key.to_string(),
            content,
            last_modified: modified_utc(metadata.modified()),
        })
    }

    async fn put_object(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let tmp = parent.join(format!(".{file_name}.tmp-{}-{n}", std::process::id()));

        if let Err(e) = tokio::fs::write(&tmp, content).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::from_io(key, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::from_io(key, e));
        }
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        tokio::fs::remove_file(self.path_for(key))
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }
}
