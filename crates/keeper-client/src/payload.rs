//! Plaintext record shapes, their validation rules and canonical encoding.
//!
//! Structured kinds serialize to compact JSON before encryption. Binary
//! records carry raw file bytes, which are only encoded for transport.

use keeper_storage::SecretKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ValidationError;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginPassword {
    pub login: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextNote {
    pub text: String,
}

#[derive(Clone, PartialEq)]
pub struct BinaryFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BankCard {
    pub number: String,
    pub holder: String,
    pub expiry: String,
    pub cvv: String,
}

/// One record's plaintext, tagged by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum SecretPayload {
    LoginPassword(LoginPassword),
    Text(TextNote),
    Binary(BinaryFile),
    BankCard(BankCard),
}

impl fmt::Debug for LoginPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPassword")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for BinaryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryFile")
            .field("file_name", &self.file_name)
            .field("len", &self.content.len())
            .finish()
    }
}

impl fmt::Debug for BankCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankCard")
            .field("holder", &self.holder)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Mod-10 checksum over an all-digit string. Empty input fails.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in number.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

fn non_empty(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(())
    }
}

impl BankCard {
    /// Card number with spaces removed.
    pub fn digits(&self) -> String {
        self.number.chars().filter(|c| *c != ' ').collect()
    }
}

impl BinaryFile {
    /// Read a file from disk. The file must be readable now, not at sync time.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read(path).map_err(|e| ValidationError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, content })
    }
}

impl SecretPayload {
    pub fn kind(&self) -> SecretKind {
        match self {
            SecretPayload::LoginPassword(_) => SecretKind::LoginPassword,
            SecretPayload::Text(_) => SecretKind::Text,
            SecretPayload::Binary(_) => SecretKind::Binary,
            SecretPayload::BankCard(_) => SecretKind::BankCard,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SecretPayload::LoginPassword(lp) => {
                non_empty(&lp.login, "login")?;
                non_empty(&lp.password, "password")
            }
            SecretPayload::Text(note) => non_empty(&note.text, "text"),
            SecretPayload::Binary(file) => {
                non_empty(&file.file_name, "file name")?;
                if file.content.is_empty() {
                    return Err(ValidationError::Empty("file content"));
                }
                Ok(())
            }
            SecretPayload::BankCard(card) => {
                non_empty(&card.number, "card number")?;
                non_empty(&card.holder, "card holder")?;
                non_empty(&card.expiry, "expiry date")?;
                non_empty(&card.cvv, "CVV")?;
                if !luhn_valid(&card.digits()) {
                    return Err(ValidationError::CardChecksum);
                }
                if card.cvv.len() != 3 || !card.cvv.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ValidationError::Cvv);
                }
                Ok(())
            }
        }
    }

    /// Canonical bytes for the payload. Card numbers are stored without spaces.
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            SecretPayload::LoginPassword(lp) => serde_json::to_vec(lp),
            SecretPayload::Text(note) => serde_json::to_vec(note),
            SecretPayload::Binary(file) => Ok(file.content.clone()),
            SecretPayload::BankCard(card) => serde_json::to_vec(&BankCard {
                number: card.digits(),
                ..card.clone()
            }),
        }
    }

    /// Inverse of [`serialize`](Self::serialize). `file_name` is only used for Binary.
    pub fn deserialize(
        kind: SecretKind,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SecretKind::LoginPassword => SecretPayload::LoginPassword(serde_json::from_slice(bytes)?),
            SecretKind::Text => SecretPayload::Text(serde_json::from_slice(bytes)?),
            SecretKind::Binary => SecretPayload::Binary(BinaryFile {
                file_name: file_name.unwrap_or_default().to_string(),
                content: bytes.to_vec(),
            }),
            SecretKind::BankCard => SecretPayload::BankCard(serde_json::from_slice(bytes)?),
        })
    }

    /// File name for Binary payloads.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            SecretPayload::Binary(file) => Some(&file.file_name),
            _ => None,
        }
    }
}
