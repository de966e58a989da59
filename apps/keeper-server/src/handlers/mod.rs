//! Handler modules for the gRPC services
//!
//! - auth: register, login (AuthService, no token required)
//! - data: create, get all, update, delete (VaultService, behind the interceptor)
//!
//! Every call is logged once with its method, duration and status code.

pub mod auth;
pub mod data;

use std::future::Future;
use std::time::Instant;
use tonic::{Code, Request, Response, Status};

use crate::server::KeeperServer;
use keeper_proto::auth_service_server::AuthService;
use keeper_proto::vault_service_server::VaultService;
use keeper_proto::*;

async fn logged<T>(
    method: &'static str,
    call: impl Future<Output = Result<Response<T>, Status>>,
) -> Result<Response<T>, Status> {
    let started = Instant::now();
    let result = call.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => tracing::info!(method, elapsed_ms, code = ?Code::Ok, "call finished"),
        Err(status) => match status.code() {
            Code::Internal | Code::Unknown | Code::DataLoss => tracing::error!(
                method,
                elapsed_ms,
                code = ?status.code(),
                detail = status.message(),
                "call failed"
            ),
            code => tracing::info!(method, elapsed_ms, code = ?code, "call rejected"),
        },
    }
    result
}

#[tonic::async_trait]
impl AuthService for KeeperServer {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        logged("Register", auth::register(self, request)).await
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        logged("Login", auth::login(self, request)).await
    }
}

#[tonic::async_trait]
impl VaultService for KeeperServer {
    async fn create_data(
        &self,
        request: Request<CreateDataRequest>,
    ) -> Result<Response<CreateDataResponse>, Status> {
        logged("CreateData", data::create_data(self, request)).await
    }

    async fn get_all_data(
        &self,
        request: Request<GetAllDataRequest>,
    ) -> Result<Response<GetAllDataResponse>, Status> {
        logged("GetAllData", data::get_all_data(self, request)).await
    }

    async fn update_data(
        &self,
        request: Request<UpdateDataRequest>,
    ) -> Result<Response<UpdateDataResponse>, Status> {
        logged("UpdateData", data::update_data(self, request)).await
    }

    async fn delete_data(
        &self,
        request: Request<DeleteDataRequest>,
    ) -> Result<Response<DeleteDataResponse>, Status> {
        logged("DeleteData", data::delete_data(self, request)).await
    }
}
