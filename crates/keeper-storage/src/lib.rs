//! Storage abstraction for keeper.
//!
//! The server talks to two collaborators: a relational [`Store`] for users and
//! record metadata, and an [`ObjectStore`] for Binary payloads. Backend crates
//! (keeper-store-sqlite, keeper-objects) implement these traits so the server
//! does not depend on a specific database engine or blob service.

use thiserror::Error;

pub mod objects;
pub mod store;
pub mod types;

pub use objects::ObjectStore;
pub use store::Store;
pub use types::*;

#[cfg(feature = "test-support")]
pub use objects::MockObjectStore;
#[cfg(feature = "test-support")]
pub use store::MockStore;

/// Uniform error type for relational backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from an object store. Each failing operation names the key.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("failed to read object {key}: {reason}")]
    Read { key: String, reason: String },
    #[error("failed to write object {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("failed to delete object {key}: {reason}")]
    Delete { key: String, reason: String },
}
