mod auth;
mod config;
mod handlers;
mod server;

#[cfg(test)]
mod tests;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::oneshot;
use tonic::transport::{Identity, ServerTlsConfig};
use tracing_subscriber::EnvFilter;

use auth::TokenAuthority;
use config::{ServeArgs, ServerConfig};
use keeper_objects::FsObjectStore;
use keeper_store_sqlite::SqliteStore;
use server::KeeperServer;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "keeper-server")]
#[command(about = "keeper vault server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gRPC server
    Serve(ServeArgs),
}

// ────────────────────────────────────── Serve ──────────────────────────────────────

async fn cmd_serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&config.database_url).await?;
    let objects = FsObjectStore::open(config.object_dir.clone()).await?;

    let tokens = match config.token_key {
        Some(key) => TokenAuthority::new(key),
        None => {
            tracing::warn!("KEEPER_TOKEN_KEY not set; tokens will not survive a restart");
            TokenAuthority::generate()
        }
    };

    let server = KeeperServer::new(Arc::new(store), Arc::new(objects), Arc::new(tokens));

    let tls = match &config.tls {
        Some(paths) => {
            let cert = tokio::fs::read_to_string(&paths.cert).await?;
            let key = tokio::fs::read_to_string(&paths.key).await?;
            Some(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        tls = tls.is_some(),
        objects = %config.object_dir.display(),
        "keeper-server listening"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server::serve(server, listener, tls, async move {
        let _ = shutdown_rx.await;
    }));

    tokio::select! {
        finished = &mut server_task => {
            // The server stopped before any signal arrived.
            finished??;
            return Ok(());
        }
        signal = shutdown_signal() => signal?,
    }

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(config.shutdown_grace, &mut server_task).await {
        Ok(finished) => finished??,
        Err(_) => {
            tracing::warn!(
                grace_secs = config.shutdown_grace.as_secs(),
                "in-flight calls did not finish in time; aborting"
            );
            server_task.abort();
        }
    }

    tracing::info!("keeper-server stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down gracefully"),
    }
    Ok(())
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig::from_args(args)?;
            cmd_serve(config).await?;
        }
    }

    Ok(())
}
