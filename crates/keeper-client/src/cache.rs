//! Durable per-user record cache.
//!
//! One JSON file per user at `<data dir>/<user id>/data.json`:
//!
//! ```json
//! { "data": { "17": { "id": 17, "kind": "text", ... } } }
//! ```
//!
//! Every mutation rewrites the whole file through a temporary sibling and a
//! rename, so a crash leaves either the old or the new contents.

use chrono::Utc;
use keeper_storage::{DataId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::record::SecretRecord;

const CACHE_FILE: &str = "data.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode cache: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("record {0} not found in local cache")]
    NotFound(DataId),
}

#[derive(Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    data: BTreeMap<DataId, SecretRecord>,
}

static LAST_PROVISIONAL: AtomicI64 = AtomicI64::new(0);

/// Provisional id for a record the server has not seen yet: the current time in
/// nanoseconds, bumped so ids are strictly increasing within the process.
pub fn provisional_id() -> DataId {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let prev = LAST_PROVISIONAL
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(now.max(prev.saturating_add(1)))
        })
        .unwrap_or_else(|prev| prev);
    DataId(now.max(prev.saturating_add(1)))
}

pub struct LocalCache {
    path: PathBuf,
    owner: UserId,
    lock: Mutex<()>,
}

impl LocalCache {
    /// Open the cache for `owner` under `data_dir`, creating the user directory.
    /// A missing cache file is an empty cache, not an error.
    pub fn open(data_dir: &Path, owner: UserId) -> Result<Self, CacheError> {
        let dir = data_dir.join(owner.to_string());
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Write {
            path: dir.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).map_err(
                |source| CacheError::Write {
                    path: dir.clone(),
                    source,
                },
            )?;
        }

        Ok(Self {
            path: dir.join(CACHE_FILE),
            owner,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Store a record the server has not seen yet under a fresh provisional id.
    /// The id is above every id already in the cache, so records written by
    /// earlier processes are never overwritten even if the clock went back.
    pub fn insert_new(
        &self,
        build: impl FnOnce(DataId) -> SecretRecord,
    ) -> Result<DataId, CacheError> {
        self.mutate(|file| {
            let floor = file
                .data
                .keys()
                .next_back()
                .map_or(i64::MIN, |last| last.0.saturating_add(1));
            let id = DataId(provisional_id().0.max(floor));
            let mut record = build(id);
            record.id = id;
            file.data.insert(id, record);
            Ok(id)
        })
    }

    /// Insert or overwrite by id.
    pub fn put(&self, record: SecretRecord) -> Result<(), CacheError> {
        self.mutate(|file| {
            file.data.insert(record.id, record);
            Ok(())
        })
    }

    pub fn get(&self, id: DataId) -> Result<SecretRecord, CacheError> {
        self.get_all()?.remove(&id).ok_or(CacheError::NotFound(id))
    }

    pub fn get_all(&self) -> Result<BTreeMap<DataId, SecretRecord>, CacheError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.data)
    }

    pub fn delete(&self, id: DataId) -> Result<(), CacheError> {
        self.mutate(|file| {
            file.data
                .remove(&id)
                .map(|_| ())
                .ok_or(CacheError::NotFound(id))
        })
    }

    /// Move a record from `old` to `new` in a single write.
    pub fn rekey(&self, old: DataId, new: DataId) -> Result<(), CacheError> {
        if old == new {
            return Ok(());
        }
        self.mutate(|file| {
            let mut record = file.data.remove(&old).ok_or(CacheError::NotFound(old))?;
            record.id = new;
            file.data.insert(new, record);
            Ok(())
        })
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut CacheFile) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.load()?;
        let out = f(&mut file)?;
        self.store(&file)?;
        Ok(out)
    }

    fn load(&self) -> Result<CacheFile, CacheError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, file: &CacheFile) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(file).map_err(CacheError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };

        std::fs::write(&tmp, json).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        std::fs::rename(&tmp, &self.path).map_err(write_err)
    }
}
