//! Secret record rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{DataId, Metadata, UserId};

/// The closed set of record kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    LoginPassword,
    Text,
    Binary,
    BankCard,
}

impl SecretKind {
    pub const ALL: [SecretKind; 4] = [
        SecretKind::LoginPassword,
        SecretKind::Text,
        SecretKind::Binary,
        SecretKind::BankCard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SecretKind::LoginPassword => "login_password",
            SecretKind::Text => "text",
            SecretKind::Binary => "binary",
            SecretKind::BankCard => "bank_card",
        }
    }

    /// Binary payloads live in the object store, every other kind is ciphertext.
    pub fn is_binary(self) -> bool {
        matches!(self, SecretKind::Binary)
    }
}

#[derive(Debug, Error)]
#[error("unknown record kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for SecretKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecretKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as persisted by the relational store. `content` is ciphertext for
/// structured kinds and empty for Binary.
#[derive(Clone, Debug)]
pub struct DataRow {
    pub id: DataId,
    pub owner: UserId,
    pub kind: SecretKind,
    pub content: Vec<u8>,
    pub metadata: Metadata,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a record
#[derive(Clone, Debug)]
pub struct NewData {
    pub kind: SecretKind,
    pub content: Vec<u8>,
    pub metadata: Metadata,
    pub file_name: Option<String>,
}

/// Parameters for updating a record. The kind never changes.
#[derive(Clone, Debug)]
pub struct DataUpdate {
    pub content: Vec<u8>,
    pub metadata: Metadata,
    pub file_name: Option<String>,
}
