use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod mock_shard;

use cli::{Cli, Commands};
use config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cli_config = CliConfig::load(cli.config.as_deref())?;

    info!("shardquery {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Analyze { sql } => commands::analyze(&sql),
        Commands::Register { code, sql, category } => commands::register(&code, &sql, &category),
        Commands::Run {
            sql,
            code,
            provinces,
            rows_per_shard,
            estimated_rows,
        } => {
            commands::run(&sql, &code, provinces, rows_per_shard, estimated_rows, &cli_config).await
        }
    }
}
