//! The Secret Record as the client stores and transmits it.

use chrono::{DateTime, Utc};
use keeper_crypto::{decode_opaque, decrypt, encode_opaque, encrypt, VaultKey};
use keeper_proto::convert::{from_micros, kind_from_wire, metadata_from_wire};
use keeper_proto::DataItem;
use keeper_storage::{DataId, Metadata, SecretKind, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::payload::SecretPayload;

/// A record in the local cache.
///
/// `payload` is base64 text: an encryption envelope for structured kinds, or
/// the opaque encoding of the file bytes for Binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: DataId,
    pub owner: UserId,
    pub kind: SecretKind,
    pub payload: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Turn a plaintext payload into the text stored in `SecretRecord::payload`.
///
/// Binary payloads are only encoded, not encrypted, so the server and the
/// object store can read them.
pub fn seal(payload: &SecretPayload, key: &VaultKey) -> Result<String, ClientError> {
    let kind = payload.kind();
    let bytes = payload
        .serialize()
        .map_err(|e| ClientError::Protocol(format!("cannot encode {kind} payload: {e}")))?;
    match payload {
        SecretPayload::Binary(_) => {
            tracing::warn!("binary payloads are stored encoded but not encrypted");
            Ok(encode_opaque(&bytes))
        }
        SecretPayload::LoginPassword(_) | SecretPayload::Text(_) | SecretPayload::BankCard(_) => {
            encrypt(&bytes, key).map_err(|e| ClientError::crypto(format!("encrypt {kind}"), e))
        }
    }
}

impl SecretRecord {
    /// Recover the plaintext payload.
    pub fn open(&self, key: &VaultKey) -> Result<SecretPayload, ClientError> {
        let bytes = match self.kind {
            SecretKind::Binary => decode_opaque(&self.payload)
                .map_err(|e| ClientError::crypto(format!("decode record {}", self.id), e))?,
            SecretKind::LoginPassword | SecretKind::Text | SecretKind::BankCard => {
                decrypt(&self.payload, key)
                    .map_err(|e| ClientError::crypto(format!("decrypt record {}", self.id), e))?
                    .to_vec()
            }
        };
        SecretPayload::deserialize(self.kind, &bytes, self.file_name.as_deref()).map_err(|e| {
            ClientError::Protocol(format!("record {} has unreadable content: {e}", self.id))
        })
    }

    /// Build a record from a server item.
    pub fn from_wire(item: DataItem, owner: UserId) -> Result<Self, ClientError> {
        let id = DataId(item.data_id);
        let kind = kind_from_wire(item.data_type)
            .ok_or_else(|| ClientError::Protocol(format!("record {id} has unknown kind")))?;
        let payload = String::from_utf8(item.content)
            .map_err(|_| ClientError::Protocol(format!("record {id} content is not text")))?;
        let created_at = from_micros(item.created_at)
            .ok_or_else(|| ClientError::Protocol(format!("record {id} has a bad created_at")))?;
        let updated_at = from_micros(item.updated_at)
            .ok_or_else(|| ClientError::Protocol(format!("record {id} has a bad updated_at")))?;

        Ok(Self {
            id,
            owner,
            kind,
            payload,
            metadata: metadata_from_wire(item.metadata),
            file_name: (!item.file_name.is_empty()).then_some(item.file_name),
            created_at,
            updated_at,
        })
    }
}
