mod cli;
mod commands;
mod grpc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::*;
use grpc::{default_data_dir, Context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context {
        server: cli.server,
        tls_ca_cert: cli.tls_ca_cert,
        data_dir: cli.data_dir.unwrap_or_else(default_data_dir),
        username: cli.username,
        password: cli.password,
    };

    match cli.command {
        Command::Register => {
            cmd_register(&ctx).await?;
        }
        Command::Add { record } => {
            cmd_record_add(&ctx, record).await?;
        }
        Command::List => {
            cmd_record_list(&ctx).await?;
        }
        Command::Show { id, output } => {
            cmd_record_show(&ctx, id, output.as_deref()).await?;
        }
        Command::Update { id, record } => {
            cmd_record_update(&ctx, id, record).await?;
        }
        Command::Delete { id } => {
            cmd_record_delete(&ctx, id).await?;
        }
        Command::Sync => {
            cmd_sync(&ctx).await?;
        }
    }

    Ok(())
}
