//! Bearer tokens and the interceptor that checks them.
//!
//! Tokens are compact JWS values signed with Ed25519:
//!
//! ```text
//! base64url({"alg":"EdDSA","typ":"JWT"}) . base64url(claims) . base64url(signature)
//! ```
//!
//! Claims carry the username (`sub`) and unix-second `iat`/`exp`. There is no
//! revocation list; a token is valid until it expires.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keeper_proto::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tonic::service::Interceptor;
use tonic::{Request, Status};

const HEADER: &str = r#"{"alg":"EdDSA","typ":"JWT"}"#;
const ALGORITHM: &str = "EdDSA";

/// Token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("token signature verification failed")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Issues and verifies tokens with a single Ed25519 key.
pub struct TokenAuthority {
    signing: SigningKey,
    verifying: VerifyingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key();
        Self {
            signing,
            verifying,
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// Fresh random key. Tokens do not survive a restart.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand_core::OsRng))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, username: &str) -> String {
        self.issue_at(username, Utc::now())
    }

    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        // Serializing a struct of strings and integers cannot fail.
        let claims_json = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER.as_bytes()),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.signing.sign(signing_input.as_bytes());
        format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments"));
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed("header encoding"))?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|_| TokenError::Malformed("header json"))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed("signature encoding"))?;
        let signature_array: [u8; 64] = signature_bytes
            .as_slice()
            .try_into()
            .map_err(|_| TokenError::Malformed("signature length"))?;
        let signature = Signature::from_bytes(&signature_array);

        let signing_input = format!("{header_b64}.{claims_b64}");
        self.verifying
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed("claims encoding"))?;
        let claims: Claims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| TokenError::Malformed("claims json"))?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// The authenticated caller, placed in request extensions by [`AuthInterceptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Rejects any call without a valid `authorization: Bearer <token>` header.
#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: Arc<TokenAuthority>,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<TokenAuthority>) -> Self {
        Self { tokens }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let header = request
            .metadata()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Status::unauthenticated("Missing authorization metadata"))?;

        let token = header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Status::unauthenticated("Authorization must be a bearer token"))?;

        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected token");
            Status::unauthenticated(format!("Invalid token: {e}"))
        })?;

        request.extensions_mut().insert(Identity {
            username: claims.sub,
        });
        Ok(request)
    }
}

/// The identity the interceptor attached to `request`.
pub fn identity<T>(request: &Request<T>) -> Result<&Identity, Status> {
    request
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| Status::unauthenticated("Missing identity"))
}
