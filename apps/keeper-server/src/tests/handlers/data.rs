//! Record handler tests.

use std::collections::HashMap;
use std::sync::Arc;
use tonic::{Code, Request};

use keeper_objects::MemoryObjectStore;
use keeper_proto::convert::{kind_to_wire, metadata_to_wire};
use keeper_proto::vault_service_server::VaultService;
use keeper_proto::{
    CreateDataRequest, DataType, DeleteDataRequest, GetAllDataRequest, UpdateDataRequest,
};
use keeper_storage::{
    DataId, DataRow, Metadata, MetadataValue, MockObjectStore, MockStore, ObjectError, ObjectKey,
    ObjectStore, SecretKind, Store, StoreError, User, UserId, FILE_URL_KEY,
};
use keeper_store_sqlite::SqliteStore;

use super::super::common::*;

async fn stored_key(server: &crate::server::KeeperServer, owner: UserId, id: i64) -> ObjectKey {
    let row = server.store.get_data(&owner, &DataId(id)).await.unwrap();
    let raw = row.metadata[FILE_URL_KEY].as_str().unwrap();
    ObjectKey::parse(raw).unwrap()
}

fn update(id: i64, content: &[u8], file_name: &str) -> UpdateDataRequest {
    UpdateDataRequest {
        data_id: id,
        content: content.to_vec(),
        metadata: HashMap::new(),
        file_name: file_name.to_string(),
    }
}

#[tokio::test]
async fn handler_create_and_get_all_text() {
    let (server, objects) = create_test_server().await;
    create_test_user(&server, "alice").await;

    let mut metadata = Metadata::new();
    metadata.insert("site".into(), "example.com".into());
    let created = server
        .create_data(authed(
            "alice",
            CreateDataRequest {
                data_type: kind_to_wire(SecretKind::Text),
                content: b"ciphertext".to_vec(),
                metadata: metadata_to_wire(&metadata),
                file_name: String::new(),
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(created.data_id > 0);
    assert!(created.updated_at > 0);
    assert!(objects.is_empty());

    let items = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].data_id, created.data_id);
    assert_eq!(items[0].content, b"ciphertext");
    assert_eq!(items[0].updated_at, created.updated_at);
    assert_eq!(
        items[0].metadata["site"].clone().into_scalar(),
        Some(MetadataValue::from("example.com"))
    );
}

#[tokio::test]
async fn handler_create_rejects_bad_input() {
    let (server, _) = create_test_server().await;
    create_test_user(&server, "alice").await;

    let err = server
        .create_data(authed(
            "alice",
            CreateDataRequest {
                data_type: DataType::Unspecified as i32,
                content: b"x".to_vec(),
                metadata: HashMap::new(),
                file_name: String::new(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let mut metadata = Metadata::new();
    metadata.insert("score".into(), MetadataValue::Number(f64::INFINITY));
    let err = server
        .create_data(authed(
            "alice",
            CreateDataRequest {
                data_type: kind_to_wire(SecretKind::Text),
                content: b"x".to_vec(),
                metadata: metadata_to_wire(&metadata),
                file_name: String::new(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = server
        .create_data(authed(
            "alice",
            CreateDataRequest {
                data_type: kind_to_wire(SecretKind::Binary),
                content: b"bytes".to_vec(),
                metadata: HashMap::new(),
                file_name: " ".into(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn handler_get_all_empty_is_not_found() {
    let (server, _) = create_test_server().await;
    create_test_user(&server, "alice").await;

    let err = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn handler_unknown_identity_is_unauthenticated() {
    let (server, _) = create_test_server().await;

    let err = server
        .get_all_data(authed("ghost", GetAllDataRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);

    // No identity at all: the interceptor never ran.
    let err = server
        .get_all_data(Request::new(GetAllDataRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn handler_binary_goes_to_object_store() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;

    let id = create_test_data(&server, "alice", SecretKind::Binary, b"AQID", "../scan.pdf").await;

    let key = stored_key(&server, owner, id).await;
    assert!(objects.contains(&key));
    assert!(key.as_str().starts_with(&format!("{}/", owner)));
    assert_eq!(key.file_name(), "scan.pdf");

    let row = server.store.get_data(&owner, &DataId(id)).await.unwrap();
    assert!(row.content.is_empty());
    assert_eq!(row.file_name.as_deref(), Some("scan.pdf"));

    let items = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items;
    assert_eq!(items[0].content, b"AQID");
    assert_eq!(items[0].file_name, "scan.pdf");
}

#[tokio::test]
async fn handler_get_all_fails_when_file_is_missing() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"AQID", "a.bin").await;

    let key = stored_key(&server, owner, id).await;
    keeper_storage::ObjectStore::delete(&objects, &key)
        .await
        .unwrap();

    let err = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(err.message().contains(&id.to_string()));
}

#[tokio::test]
async fn handler_update_text_moves_timestamp_forward() {
    let (server, _) = create_test_server().await;
    create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Text, b"v1", "").await;

    let before = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items[0]
        .updated_at;

    let resp = server
        .update_data(authed("alice", update(id, b"v2", "")))
        .await
        .unwrap()
        .into_inner();
    assert!(resp.updated_at >= before);

    let items = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items;
    assert_eq!(items[0].content, b"v2");
    assert_eq!(items[0].updated_at, resp.updated_at);
}

#[tokio::test]
async fn handler_update_binary_same_name_overwrites_in_place() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"old", "a.bin").await;
    let key = stored_key(&server, owner, id).await;

    server
        .update_data(authed("alice", update(id, b"new", "a.bin")))
        .await
        .unwrap();
    assert_eq!(stored_key(&server, owner, id).await, key);
    assert_eq!(objects.len(), 1);

    // An empty file name keeps the current one.
    server
        .update_data(authed("alice", update(id, b"newer", "")))
        .await
        .unwrap();
    assert_eq!(stored_key(&server, owner, id).await, key);

    let items = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items;
    assert_eq!(items[0].content, b"newer");
}

#[tokio::test]
async fn handler_update_binary_rename_replaces_object() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"old", "a.bin").await;
    let old_key = stored_key(&server, owner, id).await;

    server
        .update_data(authed("alice", update(id, b"new", "b.bin")))
        .await
        .unwrap();

    let new_key = stored_key(&server, owner, id).await;
    assert_ne!(new_key, old_key);
    assert_eq!(new_key.file_name(), "b.bin");
    assert!(!objects.contains(&old_key));
    assert!(objects.contains(&new_key));
    assert_eq!(objects.len(), 1);

    let row = server.store.get_data(&owner, &DataId(id)).await.unwrap();
    assert_eq!(row.file_name.as_deref(), Some("b.bin"));
}

#[tokio::test]
async fn handler_failed_rename_upload_restores_old_file() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let mut objects = MockObjectStore::new();
    // One put for the create, one to restore the old file.
    objects
        .expect_put()
        .withf(|key, _| key.file_name() == "a.bin")
        .times(2)
        .returning(|_, _| Ok(()));
    objects
        .expect_put()
        .withf(|key, _| key.file_name() == "b.bin")
        .times(1)
        .returning(|key, _| {
            Err(ObjectError::Write {
                key: key.to_string(),
                reason: "no space left on device".into(),
            })
        });
    objects
        .expect_get()
        .times(1)
        .returning(|_| Ok(b"old".to_vec()));
    objects.expect_delete().times(1).returning(|_| Ok(()));

    let server = create_test_server_with(store, Arc::new(objects));
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"old", "a.bin").await;
    let old_key = stored_key(&server, owner, id).await;

    let err = server
        .update_data(authed("alice", update(id, b"new", "b.bin")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);

    // The row was never touched and still names the restored file.
    assert_eq!(stored_key(&server, owner, id).await, old_key);
}

#[tokio::test]
async fn handler_failed_rename_row_update_restores_old_file() {
    let owner = UserId(1);
    let old_key = ObjectKey::for_upload(&owner, "a.bin");
    let mut metadata = Metadata::new();
    metadata.insert(FILE_URL_KEY.into(), old_key.as_str().into());
    let row = DataRow {
        id: DataId(7),
        owner,
        kind: SecretKind::Binary,
        content: Vec::new(),
        metadata,
        file_name: Some("a.bin".into()),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    let mut store = MockStore::new();
    store.expect_get_user_by_name().returning(|name| {
        Ok(User {
            id: UserId(1),
            username: name.to_string(),
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        })
    });
    store
        .expect_get_data()
        .returning(move |_, _| Ok(row.clone()));
    store
        .expect_update_data()
        .times(1)
        .returning(|_, _, _| Err(StoreError::Backend("disk I/O error".into())));

    let objects = MemoryObjectStore::new();
    objects.put(&old_key, b"old").await.unwrap();
    let server = create_test_server_with(Arc::new(store), Arc::new(objects.clone()));

    let err = server
        .update_data(authed("alice", update(7, b"new", "b.bin")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);

    // Old file back in place, new upload gone.
    assert!(objects.contains(&old_key));
    assert_eq!(objects.len(), 1);
    assert_eq!(objects.get(&old_key).await.unwrap(), b"old");
}

#[tokio::test]
async fn handler_update_ignores_client_file_location() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"old", "a.bin").await;
    let key = stored_key(&server, owner, id).await;

    let mut metadata = Metadata::new();
    metadata.insert(FILE_URL_KEY.into(), "999/elsewhere/x.bin".into());
    let mut req = update(id, b"new", "a.bin");
    req.metadata = metadata_to_wire(&metadata);

    server.update_data(authed("alice", req)).await.unwrap();
    assert_eq!(stored_key(&server, owner, id).await, key);
    assert_eq!(objects.len(), 1);
}

#[tokio::test]
async fn handler_records_of_other_users_are_invisible() {
    let (server, _) = create_test_server().await;
    create_test_user(&server, "alice").await;
    create_test_user(&server, "bob").await;
    let id = create_test_data(&server, "alice", SecretKind::Text, b"mine", "").await;

    let err = server
        .update_data(authed("bob", update(id, b"stolen", "")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = server
        .delete_data(authed("bob", DeleteDataRequest { data_id: id }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = server
        .get_all_data(authed("bob", GetAllDataRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let items = server
        .get_all_data(authed("alice", GetAllDataRequest {}))
        .await
        .unwrap()
        .into_inner()
        .items;
    assert_eq!(items[0].content, b"mine");
}

#[tokio::test]
async fn handler_delete_binary_removes_object_then_row() {
    let (server, objects) = create_test_server().await;
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"AQID", "a.bin").await;

    server
        .delete_data(authed("alice", DeleteDataRequest { data_id: id }))
        .await
        .unwrap();

    assert!(objects.is_empty());
    assert!(matches!(
        server.store.get_data(&owner, &DataId(id)).await,
        Err(StoreError::NotFound)
    ));

    let err = server
        .delete_data(authed("alice", DeleteDataRequest { data_id: id }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn handler_failed_object_delete_keeps_row() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let mut objects = MockObjectStore::new();
    objects.expect_put().times(1).returning(|_, _| Ok(()));
    objects.expect_delete().times(1).returning(|key| {
        Err(ObjectError::Delete {
            key: key.to_string(),
            reason: "permission denied".into(),
        })
    });

    let server = create_test_server_with(store, Arc::new(objects));
    let owner = create_test_user(&server, "alice").await;
    let id = create_test_data(&server, "alice", SecretKind::Binary, b"AQID", "a.bin").await;

    let err = server
        .delete_data(authed("alice", DeleteDataRequest { data_id: id }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);

    let row = server.store.get_data(&owner, &DataId(id)).await.unwrap();
    assert!(row.metadata.contains_key(FILE_URL_KEY));
}

#[tokio::test]
async fn handler_failed_insert_removes_upload() {
    let mut store = MockStore::new();
    store.expect_get_user_by_name().returning(|name| {
        Ok(User {
            id: UserId(1),
            username: name.to_string(),
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        })
    });
    store
        .expect_create_data()
        .times(1)
        .returning(|_, _| Err(StoreError::Backend("disk I/O error".into())));

    let objects = MemoryObjectStore::new();
    let server = create_test_server_with(Arc::new(store), Arc::new(objects.clone()));

    let err = server
        .create_data(authed(
            "alice",
            CreateDataRequest {
                data_type: kind_to_wire(SecretKind::Binary),
                content: b"AQID".to_vec(),
                metadata: HashMap::new(),
                file_name: "a.bin".into(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(objects.is_empty());
}
