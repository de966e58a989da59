use keeper_client::transport::clients;
use keeper_client::{connect, login, Vault};
use keeper_crypto::KdfParams;
use keeper_proto::auth_service_client::AuthServiceClient;
use keeper_proto::vault_service_client::VaultServiceClient;
use std::path::PathBuf;
use tonic::transport::Channel;

/// Connection and account settings shared by every command.
pub struct Context {
    pub server: String,
    pub tls_ca_cert: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Context {
    pub fn credentials(&self) -> Result<(&str, &str), Box<dyn std::error::Error>> {
        let username = self
            .username
            .as_deref()
            .ok_or("No username given. Pass --username or set KEEPER_USERNAME")?;
        let password = self
            .password
            .as_deref()
            .ok_or("No password given. Pass --password or set KEEPER_PASSWORD")?;
        Ok((username, password))
    }
}

/// `~/.keeper`, or `.keeper` in the working directory when there is no home.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".keeper"))
        .unwrap_or_else(|| PathBuf::from(".keeper"))
}

pub async fn setup_auth_client(
    ctx: &Context,
) -> Result<AuthServiceClient<Channel>, Box<dyn std::error::Error>> {
    let channel = connect(&ctx.server, ctx.tls_ca_cert.as_deref()).await?;
    Ok(clients(channel).0)
}

/// Log in, derive the vault key and open this user's local cache.
pub async fn setup_vault(
    ctx: &Context,
) -> Result<(Vault, VaultServiceClient<Channel>), Box<dyn std::error::Error>> {
    let (username, password) = ctx.credentials()?;
    let channel = connect(&ctx.server, ctx.tls_ca_cert.as_deref()).await?;
    let (mut auth, vault_client) = clients(channel);

    let session = login(&mut auth, username, password, KdfParams::default()).await?;
    tracing::debug!(server = %ctx.server, data_dir = %ctx.data_dir.display(), "session opened");
    let vault = Vault::open(session, &ctx.data_dir)?;
    Ok((vault, vault_client))
}
