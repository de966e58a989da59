//! Auth handlers: register, login

use tonic::{Request, Response, Status};

use keeper_proto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use keeper_storage::StoreError;

use crate::server::KeeperServer;

const BAD_CREDENTIALS: &str = "Invalid username or password";

fn check_credentials(username: &str, password: &str) -> Result<(), Status> {
    if username.trim().is_empty() {
        return Err(Status::invalid_argument("Username must not be empty"));
    }
    if password.is_empty() {
        return Err(Status::invalid_argument("Password must not be empty"));
    }
    Ok(())
}

pub async fn register(
    server: &KeeperServer,
    request: Request<RegisterRequest>,
) -> Result<Response<RegisterResponse>, Status> {
    let req = request.into_inner();
    check_credentials(&req.username, &req.password)?;

    // Argon2 runs on the blocking pool.
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || keeper_crypto::hash_password(&password))
        .await
        .map_err(|e| Status::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| Status::internal(format!("Failed to hash password: {}", e)))?;

    let user_id = server
        .store
        .create_user(&req.username, &hash)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => Status::already_exists("User already exists"),
            _ => Status::internal(format!("Failed to create user: {}", e)),
        })?;

    tracing::info!(user_id = %user_id, "registered user");
    Ok(Response::new(RegisterResponse {
        message: "User registered".to_string(),
    }))
}

pub async fn login(
    server: &KeeperServer,
    request: Request<LoginRequest>,
) -> Result<Response<LoginResponse>, Status> {
    let req = request.into_inner();
    check_credentials(&req.username, &req.password)?;

    let user = match server.store.get_user_by_name(&req.username).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(Status::unauthenticated(BAD_CREDENTIALS)),
        Err(e) => return Err(Status::internal(format!("Failed to get user: {}", e))),
    };

    let password = req.password;
    let phc = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || keeper_crypto::verify_password(&password, &phc))
        .await
        .map_err(|e| Status::internal(format!("Password check task failed: {}", e)))?
        .map_err(|e| Status::internal(format!("Stored password hash is unreadable: {}", e)))?;
    if !valid {
        return Err(Status::unauthenticated(BAD_CREDENTIALS));
    }

    let token = server.tokens.issue(&user.username);
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Response::new(LoginResponse {
        token,
        user_id: user.id.0,
        message: "Login successful".to_string(),
    }))
}
