//! wsprnet-batch-loader: resumable backfill from tar-of-tbz archives.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wsprnet_relay::batch_loader::{resolve_tar_paths, BatchLoader};
use wsprnet_relay::config::BatchLoaderConfig;
use wsprnet_relay::store::{ClickHouseStore, SpotStore};

/// One-shot resumable loader for historical tar-of-tbz archives.
#[derive(Parser, Debug)]
#[command(name = "wsprnet-batch-loader", version, about)]
struct Args {
    /// Path to an ingester-shaped JSON configuration file (store
    /// connection settings are reused; batching/state knobs are
    /// overridden by the flags below when given).
    #[arg(long)]
    config: PathBuf,

    /// ClickHouse username, if the server requires auth.
    #[arg(long, env = "CLICKHOUSE_USER")]
    clickhouse_user: Option<String>,

    /// ClickHouse password, if the server requires auth.
    #[arg(long, env = "CLICKHOUSE_PASSWORD")]
    clickhouse_password: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Parse and stage counts but never insert or write checkpoint state.
    #[arg(long)]
    dry_run: bool,

    /// Single outer tar-of-tbz archive to load.
    #[arg(long)]
    tar: Option<PathBuf>,

    /// Directory of `*.tar` archives to load, in sorted order.
    #[arg(long)]
    tar_dir: Option<PathBuf>,

    /// Stop after this many inner tbz bundles (for smoke-testing a run
    /// before committing to the full archive set).
    #[arg(long)]
    limit: Option<usize>,

    /// Discard the existing checkpoint and start over.
    #[arg(long)]
    reset: bool,

    /// Path to the JSON checkpoint file.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Inner-bundle records to buffer before issuing an insert.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Insert into this table instead of the configured spots table
    /// (staging validation before a production swap).
    #[arg(long)]
    spots_table: Option<String>,

    /// Insert into this table instead of the configured noise table.
    #[arg(long)]
    noise_table: Option<String>,
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = BatchLoaderConfig::load(&args.config)
        .with_context(|| format!("loading batch loader config from {}", args.config.display()))?;

    let tar_paths = resolve_tar_paths(args.tar.as_deref(), args.tar_dir.as_deref());
    if tar_paths.is_empty() {
        anyhow::bail!("no archives to load: pass --tar or --tar-dir");
    }

    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.spots_table.is_some() {
        config.spots_table_override = args.spots_table.clone();
    }
    if args.noise_table.is_some() {
        config.noise_table_override = args.noise_table.clone();
    }

    let store = ClickHouseStore::new(
        &config.store,
        args.clickhouse_user.as_deref(),
        args.clickhouse_password.as_deref(),
    )
    .with_tables(config.spots_table_override.clone(), config.noise_table_override.clone());
    let store: Arc<dyn SpotStore> = Arc::new(store);

    let loader = BatchLoader::new(config.state_file.clone(), config.batch_size, store)?;

    tracing::info!(archives = tar_paths.len(), "starting batch load");
    let stats = loader.run(&tar_paths, args.limit, args.reset, args.dry_run)?;
    tracing::info!(
        inner_bundles = stats.inner_bundles_processed,
        spots = stats.spots_inserted,
        noise = stats.noise_inserted,
        outer_tars_completed = stats.outer_tars_completed,
        "batch load complete"
    );

    Ok(())
}
