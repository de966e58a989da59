use keeper_proto::auth_service_client::AuthServiceClient;
use keeper_proto::vault_service_client::VaultServiceClient;
use std::path::Path;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use crate::error::ClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a channel to `server`.
///
/// With `tls_ca` the server certificate is checked against that CA only.
/// Without it, `https://` addresses use the platform trust roots and
/// `http://` addresses are plaintext.
pub async fn connect(server: &str, tls_ca: Option<&Path>) -> Result<Channel, ClientError> {
    let mut endpoint =
        Endpoint::from_shared(server.to_string())?.connect_timeout(CONNECT_TIMEOUT);

    if let Some(path) = tls_ca {
        let pem = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Config(format!("cannot read CA certificate {}: {e}", path.display()))
        })?;
        let tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
        endpoint = endpoint.tls_config(tls)?;
    } else if server.starts_with("https://") {
        endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
    }

    tracing::debug!(server, "connecting");
    Ok(endpoint.connect().await?)
}

/// Both service clients over one channel.
pub fn clients(channel: Channel) -> (AuthServiceClient<Channel>, VaultServiceClient<Channel>) {
    (
        AuthServiceClient::new(channel.clone()),
        VaultServiceClient::new(channel),
    )
}
