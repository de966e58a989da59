//! Object stores for Binary record payloads.
//!
//! - [`FsObjectStore`] keeps each object as a file under a root directory.
//!   Suitable for single-node deployments.
//! - [`MemoryObjectStore`] keeps objects in a concurrent map. Useful for tests
//!   and throwaway servers; contents vanish with the process.

use async_trait::async_trait;
use dashmap::DashMap;
use keeper_storage::{ObjectError, ObjectKey, ObjectStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem-backed object store.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if needed) the store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ObjectError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ObjectError::Write {
                key: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &ObjectKey) -> Result<PathBuf, ObjectError> {
        // Keys built by the server are already clean; re-check anything read back from storage.
        let key = ObjectKey::parse(key.as_str())
            .ok_or_else(|| ObjectError::InvalidKey(key.to_string()))?;
        Ok(self.root.join(key.as_str()))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> Result<(), ObjectError> {
        let path = self.path_for(key)?;
        let write_err = |e: std::io::Error| ObjectError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        // Write beside the target then rename, so readers never see a partial object.
        let tmp = path.with_file_name(format!(".{}.part", key.file_name()));
        tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_err)?;

        tracing::debug!(key = %key, size = bytes.len(), "object stored");
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, ObjectError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ObjectError::NotFound(key.to_string()),
            _ => ObjectError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            },
        })
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ObjectError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ObjectError::NotFound(key.to_string()),
            _ => ObjectError::Delete {
                key: key.to_string(),
                reason: e.to_string(),
            },
        })?;

        // Drop the now-empty per-upload directory; ignore failures.
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::remove_dir(parent).await;
        }
        tracing::debug!(key = %key, "object deleted");
        Ok(())
    }
}

/// In-memory object store.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<ObjectKey, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> Result<(), ObjectError> {
        self.objects.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, ObjectError> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ObjectError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ObjectError> {
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ObjectError::NotFound(key.to_string()))
    }
}
