//! Client side of keeper.
//!
//! Records are validated and sealed locally, kept in a per-user cache, and
//! reconciled with the server by a last-writer-wins [`sync`]. Structured
//! payloads are encrypted with a key derived from the user's password; the
//! server only ever sees ciphertext for them.

pub mod cache;
pub mod client;
pub mod error;
pub mod payload;
pub mod record;
pub mod session;
pub mod sync;
pub mod transport;
pub mod vault;

pub use cache::{CacheError, LocalCache};
pub use client::{AuthClient, VaultClient};
pub use error::{ClientError, ValidationError};
pub use payload::{BankCard, BinaryFile, LoginPassword, SecretPayload, TextNote};
pub use record::SecretRecord;
pub use session::{login, register, Session};
pub use sync::{SyncError, SyncPhase, SyncReport};
pub use transport::connect;
pub use vault::{DecryptedRecord, Vault};
