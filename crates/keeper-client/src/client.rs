//! Client traits for testability.
//!
//! Thin trait abstractions over the generated gRPC clients so the sync engine
//! and vault operations can be unit tested without a server.

use async_trait::async_trait;
use keeper_proto::auth_service_client::AuthServiceClient;
use keeper_proto::vault_service_client::VaultServiceClient;
use keeper_proto::{
    CreateDataRequest, CreateDataResponse, DeleteDataRequest, DeleteDataResponse,
    GetAllDataRequest, GetAllDataResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, UpdateDataRequest, UpdateDataResponse,
};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

#[cfg(test)]
use mockall::automock;

/// Register and Login. Never carries a token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn register(
        &mut self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status>;

    async fn login(
        &mut self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status>;
}

/// Record operations. Every request must carry the session's bearer token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VaultClient: Send + Sync {
    async fn create_data(
        &mut self,
        request: Request<CreateDataRequest>,
    ) -> Result<Response<CreateDataResponse>, Status>;

    async fn get_all_data(
        &mut self,
        request: Request<GetAllDataRequest>,
    ) -> Result<Response<GetAllDataResponse>, Status>;

    async fn update_data(
        &mut self,
        request: Request<UpdateDataRequest>,
    ) -> Result<Response<UpdateDataResponse>, Status>;

    async fn delete_data(
        &mut self,
        request: Request<DeleteDataRequest>,
    ) -> Result<Response<DeleteDataResponse>, Status>;
}

#[async_trait]
impl AuthClient for AuthServiceClient<Channel> {
    async fn register(
        &mut self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        self.register(request).await
    }

    async fn login(
        &mut self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        self.login(request).await
    }
}

#[async_trait]
impl VaultClient for VaultServiceClient<Channel> {
    async fn create_data(
        &mut self,
        request: Request<CreateDataRequest>,
    ) -> Result<Response<CreateDataResponse>, Status> {
        self.create_data(request).await
    }

    async fn get_all_data(
        &mut self,
        request: Request<GetAllDataRequest>,
    ) -> Result<Response<GetAllDataResponse>, Status> {
        self.get_all_data(request).await
    }

    async fn update_data(
        &mut self,
        request: Request<UpdateDataRequest>,
    ) -> Result<Response<UpdateDataResponse>, Status> {
        self.update_data(request).await
    }

    async fn delete_data(
        &mut self,
        request: Request<DeleteDataRequest>,
    ) -> Result<Response<DeleteDataResponse>, Status> {
        self.delete_data(request).await
    }
}
