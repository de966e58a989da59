//! Common test helpers for server tests.

use std::sync::Arc;
use tonic::Request;

use keeper_objects::MemoryObjectStore;
use keeper_proto::convert::kind_to_wire;
use keeper_proto::vault_service_server::VaultService;
use keeper_proto::CreateDataRequest;
use keeper_storage::{ObjectStore, SecretKind, Store, UserId};
use keeper_store_sqlite::SqliteStore;

use crate::auth::{Identity, TokenAuthority};
use crate::server::KeeperServer;

/// Test helper: server over in-memory SQLite and an in-memory object store.
/// The object store is returned so tests can inspect it.
pub async fn create_test_server() -> (KeeperServer, MemoryObjectStore) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let objects = MemoryObjectStore::new();
    let server = KeeperServer::new(
        store,
        Arc::new(objects.clone()),
        Arc::new(TokenAuthority::generate()),
    );
    (server, objects)
}

/// Test helper: server over the given store and object store.
pub fn create_test_server_with(
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
) -> KeeperServer {
    KeeperServer::new(store, objects, Arc::new(TokenAuthority::generate()))
}

/// Test helper: create a user directly in the store.
pub async fn create_test_user(server: &KeeperServer, username: &str) -> UserId {
    let hash = keeper_crypto::hash_password("correct horse").unwrap();
    server.store.create_user(username, &hash).await.unwrap()
}

/// Test helper: a request as it looks after the interceptor accepted it.
pub fn authed<T>(username: &str, message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.extensions_mut().insert(Identity {
        username: username.to_string(),
    });
    request
}

/// Test helper: create a record and return its id.
pub async fn create_test_data(
    server: &KeeperServer,
    username: &str,
    kind: SecretKind,
    content: &[u8],
    file_name: &str,
) -> i64 {
    server
        .create_data(authed(
            username,
            CreateDataRequest {
                data_type: kind_to_wire(kind),
                content: content.to_vec(),
                metadata: Default::default(),
                file_name: file_name.to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner()
        .data_id
}
