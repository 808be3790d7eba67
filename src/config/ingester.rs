//! Ingester configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngesterConfig {
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_spots_table: String,
    pub clickhouse_noise_table: String,
    pub incoming_tbz_dirs: Vec<PathBuf>,
    pub extraction_dir: PathBuf,
    pub processed_tbz_file: PathBuf,
    pub max_processed_file_size: u64,
    pub max_spots_per_insert: usize,
    pub max_noise_per_insert: usize,
    pub loop_interval: u64,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            clickhouse_url: "http://localhost:8123".to_string(),
            clickhouse_database: "wspr".to_string(),
            clickhouse_spots_table: "spots".to_string(),
            clickhouse_noise_table: "noise".to_string(),
            incoming_tbz_dirs: Vec::new(),
            extraction_dir: PathBuf::from("/var/lib/wsprnet-relay/extract"),
            processed_tbz_file: PathBuf::from("/var/lib/wsprnet-relay/processed.txt"),
            max_processed_file_size: 50 * 1024 * 1024,
            max_spots_per_insert: 5000,
            max_noise_per_insert: 5000,
            loop_interval: 10,
        }
    }
}

impl IngesterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading ingester config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing ingester config: {}", path.display()))
    }
}
