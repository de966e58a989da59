//! Last-writer-wins reconciliation between the local cache and the server.
//!
//! A run has three steps:
//!
//! 1. **Fetch** the full remote set. "No data for this user" is an empty set.
//! 2. **Pull**: remote records missing locally are written verbatim; a remote
//!    record with a strictly later `updated_at` overwrites the local copy.
//! 3. **Push**: local records missing remotely are created and re-keyed to the
//!    server id; a local record with a strictly later `updated_at` is sent as an
//!    update.
//!
//! Equal timestamps are left alone on both sides, so the remote copy wins ties.
//! There is no field-level merge: concurrent edits to one record on two
//! clients keep whichever was written last. Records are not tombstoned, so a
//! record deleted on one client is recreated by another client that still
//! holds it.
//!
//! A failure aborts the remaining items of the current step; items already
//! applied stay applied.

use chrono::{DateTime, Utc};
use keeper_proto::convert::{from_micros, kind_to_wire, metadata_to_wire};
use keeper_proto::{CreateDataRequest, GetAllDataRequest, UpdateDataRequest};
use keeper_storage::DataId;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::cache::LocalCache;
use crate::client::VaultClient;
use crate::error::ClientError;
use crate::record::SecretRecord;
use crate::session::Session;

/// Outcome of comparing two copies of the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remote copy is newer
    AcceptRemote,
    /// Local copy is newer
    KeepLocal,
    /// Same timestamp; nothing to do
    InSync,
}

pub fn resolve(local: DateTime<Utc>, remote: DateTime<Utc>) -> Resolution {
    match local.cmp(&remote) {
        Ordering::Less => Resolution::AcceptRemote,
        Ordering::Greater => Resolution::KeepLocal,
        Ordering::Equal => Resolution::InSync,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pulled_new: usize,
    pub pulled_updated: usize,
    pub pushed_created: usize,
    pub pushed_updated: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        *self == SyncReport::default()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pulled {} new and {} updated, pushed {} new and {} updated",
            self.pulled_new, self.pulled_updated, self.pushed_created, self.pushed_updated
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Fetch,
    Pull,
    Push,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPhase::Fetch => "fetch",
            SyncPhase::Pull => "pull",
            SyncPhase::Push => "push",
        })
    }
}

/// A failed run. `report` counts what was applied before the failure.
#[derive(Debug, Error)]
#[error("sync {phase} failed ({report}): {source}")]
pub struct SyncError {
    pub phase: SyncPhase,
    pub report: SyncReport,
    #[source]
    pub source: ClientError,
}

/// Fetch every record the server holds for the session's user.
pub async fn fetch_remote<C: VaultClient>(
    session: &Session,
    client: &mut C,
) -> Result<BTreeMap<DataId, SecretRecord>, ClientError> {
    let response = match client
        .get_all_data(session.authorize(GetAllDataRequest {})?)
        .await
    {
        Ok(response) => response.into_inner(),
        Err(status) if status.code() == tonic::Code::NotFound => {
            tracing::info!("no data on server yet");
            return Ok(BTreeMap::new());
        }
        Err(status) => return Err(ClientError::from_status("get all data", status)),
    };

    response
        .items
        .into_iter()
        .map(|item| SecretRecord::from_wire(item, session.user_id()).map(|r| (r.id, r)))
        .collect()
}

/// Apply the remote set to the local cache.
pub fn pull(
    cache: &LocalCache,
    remote: &BTreeMap<DataId, SecretRecord>,
    report: &mut SyncReport,
) -> Result<(), ClientError> {
    let local = cache.get_all()?;

    for (id, theirs) in remote {
        match local.get(id) {
            None => {
                cache.put(theirs.clone())?;
                report.pulled_new += 1;
                tracing::debug!(id = %id, "pulled new record");
            }
            Some(ours) => match resolve(ours.updated_at, theirs.updated_at) {
                Resolution::AcceptRemote => {
                    cache.put(theirs.clone())?;
                    report.pulled_updated += 1;
                    tracing::debug!(id = %id, "pulled newer record");
                }
                Resolution::KeepLocal | Resolution::InSync => {}
            },
        }
    }
    Ok(())
}

fn stamp(micros: i64, id: DataId) -> Result<DateTime<Utc>, ClientError> {
    from_micros(micros)
        .ok_or_else(|| ClientError::Protocol(format!("record {id} got a bad timestamp")))
}

/// Send local changes to the server.
pub async fn push<C: VaultClient>(
    session: &Session,
    cache: &LocalCache,
    client: &mut C,
    remote: &BTreeMap<DataId, SecretRecord>,
    report: &mut SyncReport,
) -> Result<(), ClientError> {
    let local = cache.get_all()?;

    for (id, ours) in local {
        match remote.get(&id) {
            None => {
                let request = session.authorize(CreateDataRequest {
                    data_type: kind_to_wire(ours.kind),
                    content: ours.payload.clone().into_bytes(),
                    metadata: metadata_to_wire(&ours.metadata),
                    file_name: ours.file_name.clone().unwrap_or_default(),
                })?;
                let created = client
                    .create_data(request)
                    .await
                    .map_err(|status| ClientError::from_status("create data", status))?
                    .into_inner();

                let server_id = DataId(created.data_id);
                cache.rekey(id, server_id)?;
                // Adopt the server's timestamp so the next run sees equal copies.
                cache.put(SecretRecord {
                    id: server_id,
                    updated_at: stamp(created.updated_at, server_id)?,
                    ..ours
                })?;
                report.pushed_created += 1;
                tracing::debug!(provisional = %id, id = %server_id, "pushed new record");
            }
            Some(theirs) => match resolve(ours.updated_at, theirs.updated_at) {
                Resolution::KeepLocal => {
                    let request = session.authorize(UpdateDataRequest {
                        data_id: id.0,
                        content: ours.payload.clone().into_bytes(),
                        metadata: metadata_to_wire(&ours.metadata),
                        file_name: ours.file_name.clone().unwrap_or_default(),
                    })?;
                    let updated = client
                        .update_data(request)
                        .await
                        .map_err(|status| ClientError::from_status("update data", status))?
                        .into_inner();

                    cache.put(SecretRecord {
                        updated_at: stamp(updated.updated_at, id)?,
                        ..ours
                    })?;
                    report.pushed_updated += 1;
                    tracing::debug!(id = %id, "pushed newer record");
                }
                Resolution::AcceptRemote | Resolution::InSync => {}
            },
        }
    }
    Ok(())
}

/// One full run: fetch, pull, push.
pub async fn sync<C: VaultClient>(
    session: &Session,
    cache: &LocalCache,
    client: &mut C,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();
    let fail = |phase, report, source| SyncError {
        phase,
        report,
        source,
    };

    let remote = fetch_remote(session, client)
        .await
        .map_err(|e| fail(SyncPhase::Fetch, report, e))?;

    pull(cache, &remote, &mut report).map_err(|e| fail(SyncPhase::Pull, report, e))?;

    push(session, cache, client, &remote, &mut report)
        .await
        .map_err(|e| fail(SyncPhase::Push, report, e))?;

    tracing::info!(%report, "sync finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockVaultClient;
    use crate::session::tests::test_session;
    use chrono::Duration;
    use keeper_proto::convert::to_micros;
    use keeper_proto::{
        CreateDataResponse, DataItem, GetAllDataResponse, UpdateDataResponse,
    };
    use keeper_storage::{Metadata, SecretKind, UserId};
    use tonic::{Response, Status};

    const USER: i64 = 1;

    fn record(id: i64, payload: &str, updated_at: DateTime<Utc>) -> SecretRecord {
        SecretRecord {
            id: DataId(id),
            owner: UserId(USER),
            kind: SecretKind::Text,
            payload: payload.into(),
            metadata: Metadata::new(),
            file_name: None,
            created_at: updated_at,
            updated_at,
        }
    }

    fn item(id: i64, payload: &str, updated_at: DateTime<Utc>) -> DataItem {
        DataItem {
            data_id: id,
            data_type: kind_to_wire(SecretKind::Text),
            content: payload.as_bytes().to_vec(),
            metadata: Default::default(),
            updated_at: to_micros(updated_at),
            created_at: to_micros(updated_at),
            file_name: String::new(),
        }
    }

    fn micros_now() -> DateTime<Utc> {
        from_micros(to_micros(Utc::now())).unwrap()
    }

    fn open_cache(dir: &tempfile::TempDir) -> LocalCache {
        LocalCache::open(dir.path(), UserId(USER)).unwrap()
    }

    #[test]
    fn resolution_prefers_strictly_newer() {
        let t = Utc::now();
        assert_eq!(resolve(t, t + Duration::seconds(1)), Resolution::AcceptRemote);
        assert_eq!(resolve(t + Duration::seconds(1), t), Resolution::KeepLocal);
        assert_eq!(resolve(t, t), Resolution::InSync);
    }

    #[tokio::test]
    async fn newer_remote_overwrites_local() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        cache
            .put(record(10, "old-local", t - Duration::hours(1)))
            .unwrap();

        let mut client = MockVaultClient::new();
        client.expect_get_all_data().times(1).returning(move |_| {
            Ok(Response::new(GetAllDataResponse {
                items: vec![item(10, "fresh-remote", t)],
            }))
        });
        client.expect_create_data().times(0);
        client.expect_update_data().times(0);

        let report = sync(&session, &cache, &mut client).await.unwrap();

        assert_eq!(report.pulled_updated, 1);
        let local = cache.get(DataId(10)).unwrap();
        assert_eq!(local.payload, "fresh-remote");
        assert_eq!(local.updated_at, t);
    }

    #[tokio::test]
    async fn newer_local_is_pushed_as_update() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        cache.put(record(10, "edited", t)).unwrap();

        let server_stamp = t + Duration::seconds(2);
        let mut client = MockVaultClient::new();
        client.expect_get_all_data().times(1).returning(move |_| {
            Ok(Response::new(GetAllDataResponse {
                items: vec![item(10, "stale", t - Duration::minutes(5))],
            }))
        });
        client
            .expect_update_data()
            .withf(|req| {
                req.get_ref().data_id == 10
                    && req.get_ref().content == b"edited"
                    && req.metadata().get("authorization").is_some()
            })
            .times(1)
            .returning(move |_| {
                Ok(Response::new(UpdateDataResponse {
                    message: "updated".into(),
                    updated_at: to_micros(server_stamp),
                }))
            });
        client.expect_create_data().times(0);

        let report = sync(&session, &cache, &mut client).await.unwrap();
        assert_eq!(report.pushed_updated, 1);
        assert_eq!(cache.get(DataId(10)).unwrap().updated_at, server_stamp);
    }

    #[tokio::test]
    async fn equal_timestamps_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        cache.put(record(10, "local", t)).unwrap();

        let mut client = MockVaultClient::new();
        client.expect_get_all_data().times(1).returning(move |_| {
            Ok(Response::new(GetAllDataResponse {
                items: vec![item(10, "remote", t)],
            }))
        });
        client.expect_create_data().times(0);
        client.expect_update_data().times(0);

        let report = sync(&session, &cache, &mut client).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(cache.get(DataId(10)).unwrap().payload, "local");
    }

    #[tokio::test]
    async fn provisional_record_is_rekeyed_after_create() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        let provisional = crate::cache::provisional_id();
        cache.put(record(provisional.0, "new", t)).unwrap();

        let mut client = MockVaultClient::new();
        client
            .expect_get_all_data()
            .times(1)
            .returning(|_| Err(Status::not_found("no data for user")));
        client
            .expect_create_data()
            .withf(|req| req.get_ref().content == b"new")
            .times(1)
            .returning(move |_| {
                Ok(Response::new(CreateDataResponse {
                    data_id: 77,
                    message: "created".into(),
                    updated_at: to_micros(t),
                }))
            });

        let report = sync(&session, &cache, &mut client).await.unwrap();
        assert_eq!(report.pushed_created, 1);

        let moved = cache.get(DataId(77)).unwrap();
        assert_eq!(moved.payload, "new");
        assert!(cache.get(provisional).is_err());
    }

    #[tokio::test]
    async fn second_push_on_converged_pair_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        cache.put(record(10, "same", t)).unwrap();
        let remote: BTreeMap<_, _> = [(DataId(10), record(10, "same", t))].into();

        let mut client = MockVaultClient::new();
        client.expect_create_data().times(0);
        client.expect_update_data().times(0);

        let mut report = SyncReport::default();
        push(&session, &cache, &mut client, &remote, &mut report)
            .await
            .unwrap();
        push(&session, &cache, &mut client, &remote, &mut report)
            .await
            .unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn push_failure_keeps_earlier_progress() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        let t = micros_now();

        // two provisional records, created in id order
        let first = crate::cache::provisional_id();
        let second = crate::cache::provisional_id();
        cache.put(record(first.0, "one", t)).unwrap();
        cache.put(record(second.0, "two", t)).unwrap();

        let mut client = MockVaultClient::new();
        client.expect_get_all_data().times(1).returning(|_| {
            Ok(Response::new(GetAllDataResponse { items: vec![] }))
        });
        let mut calls = 0;
        client.expect_create_data().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Response::new(CreateDataResponse {
                    data_id: 1,
                    message: "created".into(),
                    updated_at: to_micros(t),
                }))
            } else {
                Err(Status::unavailable("connection reset"))
            }
        });

        let err = sync(&session, &cache, &mut client).await.unwrap_err();
        assert_eq!(err.phase, SyncPhase::Push);
        assert_eq!(err.report.pushed_created, 1);

        let all = cache.get_all().unwrap();
        assert!(all.contains_key(&DataId(1)));
        assert!(all.contains_key(&second));
        assert!(!all.contains_key(&first));
    }

    #[tokio::test]
    async fn fetch_errors_abort_before_touching_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);
        let session = test_session(USER);
        cache.put(record(3, "keep", micros_now())).unwrap();

        let mut client = MockVaultClient::new();
        client
            .expect_get_all_data()
            .returning(|_| Err(Status::unauthenticated("token expired")));
        client.expect_create_data().times(0);

        let err = sync(&session, &cache, &mut client).await.unwrap_err();
        assert_eq!(err.phase, SyncPhase::Fetch);
        assert!(matches!(err.source, ClientError::Authentication(_)));
        assert_eq!(cache.get(DataId(3)).unwrap().payload, "keep");
    }
}
