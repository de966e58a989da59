//! Server configuration.
//!
//! Every flag can also be set through the environment:
//!
//! ```bash
//! KEEPER_ADDR=0.0.0.0:8080
//! DATABASE_URL=sqlite://keeper.db?mode=rwc
//! KEEPER_OBJECT_DIR=./objects
//! KEEPER_TLS_CERT=server.pem          # together with KEEPER_TLS_KEY
//! KEEPER_TLS_KEY=server.key
//! KEEPER_TOKEN_KEY=<64 hex chars>     # random per start when unset
//! KEEPER_SHUTDOWN_GRACE_SECS=10
//! ```

use clap::Args;
use ed25519_dalek::SigningKey;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "KEEPER_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: String,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://keeper.db?mode=rwc")]
    pub database_url: String,

    /// Directory holding uploaded files
    #[arg(long, env = "KEEPER_OBJECT_DIR", default_value = "./objects")]
    pub object_dir: PathBuf,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, env = "KEEPER_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, env = "KEEPER_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Hex-encoded 32-byte Ed25519 seed used to sign tokens
    #[arg(long, env = "KEEPER_TOKEN_KEY", hide_env_values = true)]
    pub token_key: Option<String>,

    /// Seconds in-flight calls get to finish after a shutdown signal
    #[arg(long, env = "KEEPER_SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address {0}")]
    InvalidAddr(String),

    #[error("TLS certificate provided without key. Both --tls-cert and --tls-key are required for TLS.")]
    CertWithoutKey,

    #[error("TLS key provided without certificate. Both --tls-cert and --tls-key are required for TLS.")]
    KeyWithoutCert,

    #[error("Token key must be 32 hex-encoded bytes")]
    InvalidTokenKey,

    #[error("Shutdown grace window must be at least one second")]
    InvalidGrace,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Validated settings for `serve`.
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub object_dir: PathBuf,
    pub tls: Option<TlsPaths>,
    pub token_key: Option<SigningKey>,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn from_args(args: ServeArgs) -> Result<Self, ConfigError> {
        let addr = args
            .addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(args.addr.clone()))?;

        let tls = match (args.tls_cert, args.tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (Some(_), None) => return Err(ConfigError::CertWithoutKey),
            (None, Some(_)) => return Err(ConfigError::KeyWithoutCert),
            (None, None) => None,
        };

        let token_key = args.token_key.as_deref().map(parse_token_key).transpose()?;

        if args.shutdown_grace_secs == 0 {
            return Err(ConfigError::InvalidGrace);
        }

        Ok(Self {
            addr,
            database_url: args.database_url,
            object_dir: args.object_dir,
            tls,
            token_key,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
        })
    }
}

fn parse_token_key(raw: &str) -> Result<SigningKey, ConfigError> {
    let bytes = hex::decode(raw.trim()).map_err(|_| ConfigError::InvalidTokenKey)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ConfigError::InvalidTokenKey)?;
    Ok(SigningKey::from_bytes(&seed))
}
