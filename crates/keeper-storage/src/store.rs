//! The Store trait that relational backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The relational storage trait the server depends on.
///
/// Every record-level method is **scoped by owner**: there is no way to read or
/// mutate a row without naming the user it belongs to, and backends condition
/// their queries on `(id, owner)`. A row owned by someone else is reported as
/// [`StoreError::NotFound`].
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a user. Fails with `AlreadyExists` if the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str)
        -> Result<UserId, StoreError>;

    /// Get user by username.
    async fn get_user_by_name(&self, username: &str) -> Result<User, StoreError>;

    // ───────────────────────────────────── Records ────────────────────────────────────────

    /// Insert a record in a single transaction and return the stored row.
    async fn create_data(&self, owner: &UserId, data: &NewData) -> Result<DataRow, StoreError>;

    /// All records owned by `owner`, ordered by id. Empty when the user has none.
    async fn list_data(&self, owner: &UserId) -> Result<Vec<DataRow>, StoreError>;

    async fn get_data(&self, owner: &UserId, id: &DataId) -> Result<DataRow, StoreError>;

    /// Replace content, metadata and file name in a single transaction.
    /// Returns the new `updated_at`, which never moves backwards.
    async fn update_data(
        &self,
        owner: &UserId,
        id: &DataId,
        update: &DataUpdate,
    ) -> Result<DateTime<Utc>, StoreError>;

    async fn delete_data(&self, owner: &UserId, id: &DataId) -> Result<(), StoreError>;
}
