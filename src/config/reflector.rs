//! Reflector configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One downstream destination the Reflector fans bundles out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub user: String,
    pub host: String,
    pub path: String,
    pub ssh_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorConfig {
    /// Glob-like pattern (or directory root) under which per-user
    /// `uploads/` directories are discovered. Defaults to scanning every
    /// `/home/*/uploads/` directory.
    pub incoming_pattern: String,
    pub queue_base_dir: PathBuf,
    pub destinations: Vec<Destination>,
    pub scan_interval: u64,
    pub rsync_interval: u64,
    pub rsync_bandwidth_limit: u64,
    pub rsync_timeout: u64,
    pub min_age_seconds: u64,
    pub min_free_space_percent: f64,
    pub quarantine_dir: Option<PathBuf>,
    pub max_files_per_scan: usize,
    pub delete_patterns: Vec<String>,
    pub corrupt_min_age_seconds: u64,
    pub local_max_used_percent: f64,
    pub queue_purge_batch: usize,
    pub heartbeat_interval: u64,
    pub tar_timeout: u64,
    /// Adopts the newer, conservative policy from the open question in
    /// §9: an unverified destination is warned-through rather than
    /// disabled, but that behavior is itself made configurable here.
    pub skip_rsync_check: bool,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            incoming_pattern: "/home/*/uploads".to_string(),
            queue_base_dir: PathBuf::from("/var/lib/wsprnet-relay/queue"),
            destinations: Vec::new(),
            scan_interval: 10,
            rsync_interval: 30,
            rsync_bandwidth_limit: 0,
            rsync_timeout: 300,
            min_age_seconds: 10,
            min_free_space_percent: 25.0,
            quarantine_dir: None,
            max_files_per_scan: 500,
            delete_patterns: Vec::new(),
            corrupt_min_age_seconds: 3600,
            local_max_used_percent: 80.0,
            queue_purge_batch: 500,
            heartbeat_interval: 60,
            tar_timeout: 30,
            skip_rsync_check: false,
        }
    }
}

impl ReflectorConfig {
    /// Load from a JSON file. A missing or unparseable config is a
    /// bootstrap error (§7 category 5), so this never falls back to
    /// [`Default`] silently.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading reflector config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing reflector config: {}", path.display()))
    }
}
