use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Server, ServerTlsConfig};
use tonic::{Request, Status};

use keeper_proto::auth_service_server::AuthServiceServer;
use keeper_proto::vault_service_server::VaultServiceServer;
use keeper_storage::{ObjectStore, Store, StoreError, UserId};

use crate::auth::{identity, AuthInterceptor, TokenAuthority};

#[derive(Clone)]
pub struct KeeperServer {
    pub store: Arc<dyn Store>,
    pub objects: Arc<dyn ObjectStore>,
    pub tokens: Arc<TokenAuthority>,
}

impl KeeperServer {
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        tokens: Arc<TokenAuthority>,
    ) -> Self {
        Self {
            store,
            objects,
            tokens,
        }
    }

    /// Resolve the caller the interceptor authenticated to their user id.
    /// A token for a user that no longer exists is rejected.
    pub async fn owner<T>(&self, request: &Request<T>) -> Result<UserId, Status> {
        let identity = identity(request)?;
        match self.store.get_user_by_name(&identity.username).await {
            Ok(user) => Ok(user.id),
            Err(StoreError::NotFound) => Err(Status::unauthenticated("Unknown user")),
            Err(e) => Err(Status::internal(format!("Failed to get user: {}", e))),
        }
    }
}

/// Map a store failure on a record to a status. Missing and foreign rows look the same.
pub fn record_status(e: StoreError, action: &str) -> Status {
    match e {
        StoreError::NotFound => Status::not_found("Data not found"),
        StoreError::AlreadyExists => Status::already_exists("Data already exists"),
        _ => Status::internal(format!("Failed to {}: {}", action, e)),
    }
}

/// Serve both services plus gRPC health on `listener` until `shutdown` resolves.
///
/// AuthService is open; every VaultService call passes through [`AuthInterceptor`].
pub async fn serve(
    server: KeeperServer,
    listener: TcpListener,
    tls: Option<ServerTlsConfig>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), tonic::transport::Error> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<AuthServiceServer<KeeperServer>>()
        .await;
    health_reporter
        .set_serving::<VaultServiceServer<KeeperServer>>()
        .await;

    let mut builder = match tls {
        Some(tls) => Server::builder().tls_config(tls)?,
        None => Server::builder(),
    };

    let interceptor = AuthInterceptor::new(server.tokens.clone());
    builder
        .add_service(health_service)
        .add_service(AuthServiceServer::new(server.clone()))
        .add_service(VaultServiceServer::with_interceptor(server, interceptor))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}
