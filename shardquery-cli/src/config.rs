use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// CLI-level defaults; distinct from `shardquery_core::Config`, which tunes
/// the execution core itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub provinces: Vec<String>,
    pub rows_per_shard: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            provinces: vec!["cordoba".to_string(), "mendoza".to_string(), "santa_fe".to_string()],
            rows_per_shard: 1_000,
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        for candidate in ["shardquery.toml", ".shardquery.toml"] {
            if Path::new(candidate).exists() {
                return Self::load_from_file(Path::new(candidate));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg = config_dir.join("shardquery").join("config.toml");
            if xdg.exists() {
                return Self::load_from_file(&xdg);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "failed to parse TOML config")
    }
}
