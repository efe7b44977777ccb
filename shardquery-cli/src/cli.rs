use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shardquery")]
#[command(about = "Demo CLI for the ShardQuery adaptive multi-shard query execution core")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to a shardquery.toml config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse a SQL query's pagination/consolidation shape without registering it
    Analyze {
        /// SQL query text
        sql: String,
    },
    /// Analyse a SQL query and print the metadata payload a registry would persist
    Register {
        /// Query code to register under
        code: String,
        /// SQL query text
        sql: String,
        /// Free-form category tag
        #[arg(long, default_value = "demo")]
        category: String,
    },
    /// Register and dispatch a SQL query across synthetic in-memory shards
    Run {
        /// SQL query text
        sql: String,
        /// Query code to register the query under
        #[arg(long, default_value = "q1")]
        code: String,
        /// Comma-separated province names (defaults to the config file's list)
        #[arg(long, value_delimiter = ',')]
        provinces: Option<Vec<String>>,
        /// Synthetic row count per shard (defaults to the config file's value)
        #[arg(long)]
        rows_per_shard: Option<u64>,
        /// Seed `estimated_rows` on the registered query, to exercise the
        /// ConsolidatedExecutor's drift/re-estimation path
        #[arg(long)]
        estimated_rows: Option<u64>,
    },
}
