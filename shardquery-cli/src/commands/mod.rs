use crate::mock_shard::{ConsoleContext, SyntheticShard};
use anyhow::Result;
use shardquery_core::analyser;
use shardquery_core::config::{AnalysisConfig, ConsolidationConfig};
use shardquery_core::model::{FilterParams, Query, QueryStatus};
use shardquery_core::registry::{serialize_filter_schema, InMemoryQueryRegistry, QueryRegistry};
use shardquery_core::shard_store::ShardStore;
use shardquery_core::{run_job, Config, Job};
use std::sync::Arc;

use crate::config::CliConfig;

/// Analyse a query's shape and print the metadata a registry would persist,
/// without actually registering it.
pub fn analyze(sql: &str) -> Result<()> {
    let metadata = analyser::analyse(sql, &AnalysisConfig::default(), &ConsolidationConfig::default())?;

    println!("consolidable:          {}", metadata.consolidable);
    println!("consolidation_kind:    {:?}", metadata.consolidation_kind);
    println!("pagination_strategy:   {:?}", metadata.pagination_strategy);
    println!("grouping_fields:       {:?}", metadata.grouping_fields);
    println!("numeric_fields:        {:?}", metadata.numeric_fields);
    println!("time_fields:           {:?}", metadata.time_fields);
    println!("location_fields:       {:?}", metadata.location_fields);
    println!("keyset_fields:         {} field(s)", metadata.keyset_fields.len());
    println!("id_column:             {:?}", metadata.id_column);
    println!("filter_schema:         {} filter(s) detected", metadata.filter_schema.len());
    for (param, spec) in &metadata.filter_schema {
        println!(
            "  - {param}: column={} kind={:?} hard_coded={}",
            spec.sql_column, spec.kind, spec.hard_coded
        );
    }

    Ok(())
}

/// Analyse a query and save it into a throwaway registry, printing the JSON
/// blob a real persistence layer would store alongside it.
pub fn register(code: &str, sql: &str, category: &str) -> Result<()> {
    let metadata = analyser::analyse(sql, &AnalysisConfig::default(), &ConsolidationConfig::default())?;

    let mut query = Query::new(code, sql, category);
    query.status = QueryStatus::Registered;

    let registry = InMemoryQueryRegistry::new();
    let filter_schema_json = serialize_filter_schema(&metadata.filter_schema);
    registry.save(query, metadata)?;

    let registered = registry.get(code)?.expect("just saved");
    println!("registered '{code}' as {:?}", registered.query.status);
    println!("pagination_strategy: {:?}", registered.metadata.pagination_strategy);
    println!("filter_schema JSON:");
    println!("{filter_schema_json}");

    Ok(())
}

/// Register a query and dispatch it across synthetic in-memory shards, one
/// per configured province.
pub async fn run(
    sql: &str,
    code: &str,
    provinces: Option<Vec<String>>,
    rows_per_shard: Option<u64>,
    estimated_rows: Option<u64>,
    cli_config: &CliConfig,
) -> Result<()> {
    let config = Config::default();
    let metadata = analyser::analyse(sql, &AnalysisConfig::default(), &config.consolidation)?;

    let mut query = Query::new(code, sql, "demo");
    query.status = QueryStatus::Registered;
    query.estimated_rows = estimated_rows;

    let registry = Arc::new(InMemoryQueryRegistry::new());
    registry.save(query, metadata)?;

    let provinces = provinces.unwrap_or_else(|| cli_config.provinces.clone());
    let rows_per_shard = rows_per_shard.unwrap_or(cli_config.rows_per_shard);

    let shards: Vec<Arc<dyn ShardStore>> = provinces
        .iter()
        .map(|p| Arc::new(SyntheticShard::new(p.clone(), rows_per_shard)) as Arc<dyn ShardStore>)
        .collect();

    println!(
        "dispatching '{code}' across {} synthetic shard(s) ({rows_per_shard} rows each)",
        shards.len()
    );

    let ctx = Arc::new(ConsoleContext::new());

    let job = Job {
        query_code: code.to_string(),
        filters: FilterParams::default(),
        shards,
        registry,
        ctx: ctx.clone(),
        config,
    };

    let total = run_job(job).await?;
    ctx.finish();

    println!("forwarded {total} row(s) total");

    Ok(())
}
