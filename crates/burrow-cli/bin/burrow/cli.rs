use burrow_storage::StoreConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const STATEMENT_TIMEOUT_ENV: &str = "BURROW_STATEMENT_TIMEOUT_MS";
pub const MAX_CONNECTIONS_ENV: &str = "BURROW_MAX_CONNECTIONS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "Shorten and resolve URLs against a burrow store")]
pub struct CLI {
    /// Journal file for the file-backed store.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV, global = true)]
    pub file_storage_path: Option<PathBuf>,

    /// PostgreSQL connection string; wins over the journal file.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV, global = true)]
    pub database_dsn: Option<String>,

    /// Public prefix of the short URLs that are printed.
    #[arg(
        short = 'b',
        long,
        env = BASE_URL_ENV,
        default_value = DEFAULT_BASE_URL,
        global = true
    )]
    pub base_url: String,

    #[arg(long, env = STATEMENT_TIMEOUT_ENV, default_value_t = 2_000, global = true)]
    pub statement_timeout_ms: u64,

    #[arg(long, env = MAX_CONNECTIONS_ENV, default_value_t = 5, global = true)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten {
        #[arg(short, long)]
        user: String,
        url: String,
    },
    /// Shorten several URLs as a single all-or-nothing batch.
    Batch {
        #[arg(short, long)]
        user: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the original URL behind a short code.
    Resolve { code: String },
    /// List the URLs a user has shortened, as JSON.
    List {
        #[arg(short, long)]
        user: String,
    },
    /// Soft delete short codes owned by a user.
    Delete {
        #[arg(short, long)]
        user: String,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Check that the store is reachable.
    Ping,
}

impl CLI {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            file_storage_path: self.file_storage_path.clone(),
            database_dsn: self.database_dsn.clone(),
            max_connections: self.max_connections,
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
        }
    }
}
