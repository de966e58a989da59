//! Record operations against the local cache.
//!
//! Create, update, list and get never touch the network; changes reach the
//! server on the next [`Vault::sync`]. Delete is the exception: it removes the
//! server copy first so a later sync does not bring the record back.

use chrono::{DateTime, Duration, Utc};
use keeper_proto::convert::{from_micros, to_micros};
use keeper_proto::DeleteDataRequest;
use keeper_storage::{check_metadata, DataId, Metadata, SecretKind};
use std::path::Path;

use crate::cache::{CacheError, LocalCache};
use crate::client::VaultClient;
use crate::error::{ClientError, ValidationError};
use crate::payload::SecretPayload;
use crate::record::{seal, SecretRecord};
use crate::session::Session;
use crate::sync::{self, SyncError, SyncReport};

/// A record with its payload opened.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedRecord {
    pub id: DataId,
    pub kind: SecretKind,
    pub payload: SecretPayload,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Timestamps travel as microseconds; keep local ones at the same precision.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    from_micros(to_micros(now)).unwrap_or(now)
}

pub struct Vault {
    session: Session,
    cache: LocalCache,
}

impl Vault {
    /// Open the cache for the session's user under `data_dir`.
    pub fn open(session: Session, data_dir: &Path) -> Result<Self, ClientError> {
        let cache = LocalCache::open(data_dir, session.user_id())?;
        Ok(Self { session, cache })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Validate, seal and store a new record under a provisional id.
    pub fn create(
        &self,
        payload: SecretPayload,
        metadata: Metadata,
    ) -> Result<DataId, ClientError> {
        payload.validate()?;
        check_metadata(&metadata).map_err(ValidationError::from)?;

        let sealed = seal(&payload, self.session.key())?;
        let at = now();
        let id = self.cache.insert_new(|id| SecretRecord {
            id,
            owner: self.session.user_id(),
            kind: payload.kind(),
            payload: sealed,
            metadata,
            file_name: payload.file_name().map(str::to_string),
            created_at: at,
            updated_at: at,
        })?;
        tracing::debug!(id = %id, kind = %payload.kind(), "created record");
        Ok(id)
    }

    /// Replace a record's payload, and its metadata when `metadata` is given.
    /// The kind of a record never changes.
    pub fn update(
        &self,
        id: DataId,
        payload: SecretPayload,
        metadata: Option<Metadata>,
    ) -> Result<(), ClientError> {
        let current = self.cache.get(id).map_err(|e| missing(e, id))?;
        if current.kind != payload.kind() {
            return Err(ValidationError::KindMismatch {
                id,
                expected: current.kind,
                actual: payload.kind(),
            }
            .into());
        }
        payload.validate()?;
        if let Some(metadata) = &metadata {
            check_metadata(metadata).map_err(ValidationError::from)?;
        }

        let sealed = seal(&payload, self.session.key())?;
        // Strictly later than the previous write so LWW sees the edit.
        let updated_at = now().max(current.updated_at + Duration::microseconds(1));
        self.cache.put(SecretRecord {
            payload: sealed,
            metadata: metadata.unwrap_or(current.metadata),
            file_name: payload.file_name().map(str::to_string),
            updated_at,
            ..current
        })?;
        tracing::debug!(id = %id, "updated record");
        Ok(())
    }

    pub fn get(&self, id: DataId) -> Result<DecryptedRecord, ClientError> {
        let record = self.cache.get(id).map_err(|e| missing(e, id))?;
        self.open_record(record)
    }

    /// Every cached record, ordered by id.
    pub fn list(&self) -> Result<Vec<DecryptedRecord>, ClientError> {
        self.cache
            .get_all()?
            .into_values()
            .map(|record| self.open_record(record))
            .collect()
    }

    /// Delete on the server, then locally. A record missing on one side is
    /// still removed from the other.
    pub async fn delete<C: VaultClient>(
        &self,
        client: &mut C,
        id: DataId,
    ) -> Result<(), ClientError> {
        let remote_found = match client
            .delete_data(self.session.authorize(DeleteDataRequest { data_id: id.0 })?)
            .await
        {
            Ok(_) => true,
            Err(status) => {
                let err = ClientError::from_status("delete data", status);
                if !err.is_not_found() {
                    return Err(err);
                }
                false
            }
        };

        match self.cache.delete(id) {
            Ok(()) => {}
            Err(CacheError::NotFound(_)) if remote_found => {}
            Err(CacheError::NotFound(_)) => return Err(ClientError::NotFound(id)),
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(id = %id, remote_found, "deleted record");
        Ok(())
    }

    pub async fn sync<C: VaultClient>(&self, client: &mut C) -> Result<SyncReport, SyncError> {
        sync::sync(&self.session, &self.cache, client).await
    }

    fn open_record(&self, record: SecretRecord) -> Result<DecryptedRecord, ClientError> {
        let payload = record.open(self.session.key())?;
        Ok(DecryptedRecord {
            id: record.id,
            kind: record.kind,
            payload,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn missing(err: CacheError, id: DataId) -> ClientError {
    match err {
        CacheError::NotFound(_) => ClientError::NotFound(id),
        other => other.into(),
    }
}
