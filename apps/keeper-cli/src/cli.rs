use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keeper")]
#[command(version)]
#[command(about = "keeper personal vault CLI")]
pub struct Cli {
    /// Server address
    #[arg(long, env = "KEEPER_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Path to TLS CA certificate for server connection (optional, for self-signed certs)
    #[arg(long, env = "KEEPER_TLS_CA_CERT")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Directory for the local record cache (default: ~/.keeper)
    #[arg(long, env = "KEEPER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Account name
    #[arg(long, short = 'u', env = "KEEPER_USERNAME")]
    pub username: Option<String>,

    /// Account password; also unlocks the local vault
    #[arg(long, short = 'p', env = "KEEPER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an account on the server
    Register,
    /// Add a record to the local vault
    Add {
        #[command(subcommand)]
        record: RecordInput,
    },
    /// List all records in the local vault
    List,
    /// Show one record in full
    Show {
        /// Record id
        id: i64,

        /// Write a file record's content to this path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Replace a record's content
    Update {
        /// Record id
        id: i64,

        #[command(subcommand)]
        record: RecordInput,
    },
    /// Delete a record from the server and the local vault
    Delete {
        /// Record id
        id: i64,
    },
    /// Reconcile the local vault with the server
    Sync,
}

/// `key=value` tags; `true`/`false` and numbers keep their type.
#[derive(Args, Clone, Debug, Default)]
pub struct Tags {
    #[arg(long = "tag", short = 't', value_name = "KEY=VALUE")]
    pub tags: Vec<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum RecordInput {
    /// Login and password pair
    Login {
        #[arg(long)]
        login: String,
        /// Password being stored (not the account password)
        #[arg(long)]
        secret: String,
        #[command(flatten)]
        tags: Tags,
    },
    /// Free-form text note
    Text {
        /// Note text
        text: String,
        #[command(flatten)]
        tags: Tags,
    },
    /// File read from disk
    File {
        /// Path to the file
        path: PathBuf,
        #[command(flatten)]
        tags: Tags,
    },
    /// Bank card
    Card {
        #[arg(long)]
        number: String,
        #[arg(long)]
        holder: String,
        /// Expiry date, e.g. 12/30
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        cvv: String,
        #[command(flatten)]
        tags: Tags,
    },
}
