mod cli;
mod commands;

use crate::cli::CLI;
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();
    let store_config = config.store_config();

    info!(
        file_storage_path = ?store_config.file_storage_path,
        database = store_config.database_dsn.is_some(),
        base_url = %config.base_url,
        "starting burrow"
    );

    let store = burrow_storage::open(&store_config)
        .await
        .context("failed to open store")?;

    let mut stdout = std::io::stdout().lock();
    commands::run(&store, &config.base_url, config.command, &mut stdout).await
}
