//! The ObjectStore trait for Binary payloads.

use crate::types::ObjectKey;
use crate::ObjectError;

/// Put/get/delete of opaque blobs by key.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `key`, replacing any existing object.
    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> Result<(), ObjectError>;

    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, ObjectError>;

    /// Remove the object at `key`. Removing a missing object is `NotFound`.
    async fn delete(&self, key: &ObjectKey) -> Result<(), ObjectError>;
}
