//! BatchLoader configuration: shares the Ingester's store settings plus
//! its own batching and checkpoint knobs.

use super::IngesterConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLoaderConfig {
    pub store: IngesterConfig,
    pub batch_size: usize,
    pub state_file: PathBuf,
    pub spots_table_override: Option<String>,
    pub noise_table_override: Option<String>,
}

impl Default for BatchLoaderConfig {
    fn default() -> Self {
        Self {
            store: IngesterConfig::default(),
            batch_size: 100_000,
            state_file: PathBuf::from("batch_loader_state.json"),
            spots_table_override: None,
            noise_table_override: None,
        }
    }
}

impl BatchLoaderConfig {
    /// Load from a JSON file. A missing or unparseable config is a
    /// bootstrap error (§7 category 5), so this never falls back to
    /// [`Default`] silently.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading batch loader config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing batch loader config: {}", path.display()))
    }
}
