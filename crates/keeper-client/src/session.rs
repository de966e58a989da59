//! Explicit per-login session: bearer token plus the derived vault key.

use keeper_crypto::{derive_key, username_salt, KdfParams, VaultKey};
use keeper_proto::{LoginRequest, RegisterRequest, AUTHORIZATION};
use keeper_storage::UserId;
use std::fmt;
use tonic::metadata::AsciiMetadataValue;
use tonic::Request;

use crate::client::AuthClient;
use crate::error::{ClientError, ValidationError};

/// Everything an authorized operation needs. Nothing here is global, so several
/// sessions can coexist in one process.
pub struct Session {
    username: String,
    user_id: UserId,
    token: String,
    key: VaultKey,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(username: String, user_id: UserId, token: String, key: VaultKey) -> Self {
        Self {
            username,
            user_id,
            token,
            key,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn key(&self) -> &VaultKey {
        &self.key
    }

    /// Wrap `message` in a request carrying `authorization: Bearer <token>`.
    pub fn authorize<T>(&self, message: T) -> Result<Request<T>, ClientError> {
        let value: AsciiMetadataValue = format!("Bearer {}", self.token)
            .parse()
            .map_err(|_| ClientError::Protocol("token is not valid header text".into()))?;
        let mut request = Request::new(message);
        request.metadata_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

fn check_credentials(username: &str, password: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::Empty("username"));
    }
    if password.is_empty() {
        return Err(ValidationError::Empty("password"));
    }
    Ok(())
}

pub async fn register<C: AuthClient>(
    client: &mut C,
    username: &str,
    password: &str,
) -> Result<String, ClientError> {
    check_credentials(username, password)?;
    let response = client
        .register(Request::new(RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await
        .map_err(|status| ClientError::from_status("register", status))?
        .into_inner();
    Ok(response.message)
}

/// Log in and derive the vault key from the same password.
pub async fn login<C: AuthClient>(
    client: &mut C,
    username: &str,
    password: &str,
    kdf: KdfParams,
) -> Result<Session, ClientError> {
    check_credentials(username, password)?;
    let response = client
        .login(Request::new(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await
        .map_err(|status| ClientError::from_status("login", status))?
        .into_inner();

    if response.token.is_empty() {
        return Err(ClientError::Protocol("login returned no token".into()));
    }

    let salt = username_salt(username);
    let passphrase = password.to_string();
    let key = tokio::task::spawn_blocking(move || derive_key(&passphrase, &salt, &kdf))
        .await
        .map_err(|e| ClientError::Protocol(format!("key derivation task failed: {e}")))?
        .map_err(|e| ClientError::crypto("derive vault key", e))?;

    tracing::debug!(user_id = response.user_id, "logged in");
    Ok(Session::new(
        username.to_string(),
        UserId(response.user_id),
        response.token,
        key,
    ))
}
