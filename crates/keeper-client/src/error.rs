use keeper_crypto::CryptoError;
use keeper_storage::{DataId, InvalidMetadata, SecretKind};
use thiserror::Error;
use tonic::{Code, Status};

use crate::cache::CacheError;

/// Bad user input. Never retried, shown to the user as-is.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("card number fails the checksum")]
    CardChecksum,
    #[error("CVV must be exactly 3 digits")]
    Cvv,
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("record {id} holds {actual}, not {expected}")]
    KindMismatch {
        id: DataId,
        expected: SecretKind,
        actual: SecretKind,
    },
    #[error("invalid metadata: {0}")]
    Metadata(#[from] InvalidMetadata),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Crypto {
        context: String,
        #[source]
        source: CryptoError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("record {0} not found")]
    NotFound(DataId),

    #[error("{op} failed: {}", .status.message())]
    Remote {
        op: &'static str,
        #[source]
        status: Status,
    },

    #[error("unexpected server response: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn crypto(context: impl Into<String>, source: CryptoError) -> Self {
        ClientError::Crypto {
            context: context.into(),
            source,
        }
    }

    /// Classify a failed call. Authentication and duplicate registration get
    /// their own variants; everything else keeps the status for the caller.
    pub fn from_status(op: &'static str, status: Status) -> Self {
        match status.code() {
            Code::Unauthenticated => ClientError::Authentication(status.message().to_string()),
            Code::AlreadyExists => ClientError::AlreadyExists(status.message().to_string()),
            _ => ClientError::Remote { op, status },
        }
    }

    /// True when the server reported a missing record or an empty vault.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound(_) => true,
            ClientError::Remote { status, .. } => status.code() == Code::NotFound,
            _ => false,
        }
    }
}
