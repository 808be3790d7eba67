//! wsprnet-ingester: Stage B ingestion daemon.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wsprnet_relay::config::IngesterConfig;
use wsprnet_relay::ingester::Ingester;
use wsprnet_relay::store::{ClickHouseStore, SpotStore};

/// Drains incoming bundle directories into the analytic store.
#[derive(Parser, Debug)]
#[command(name = "wsprnet-ingester", version, about)]
struct Args {
    /// Path to the ingester JSON configuration file.
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

    /// Parse bundles but never insert or delete anything.
    #[arg(long)]
    dry_run: bool,

    /// Run forever, sleeping SECONDS between cycles. Absent means run a
    /// single drain cycle and exit.
    #[arg(long, value_name = "SECONDS")]
    r#loop: Option<u64>,

    /// Idempotently create the extraction/memo directories and the two
    /// analytic-store tables, then exit.
    #[arg(long)]
    setup_system: bool,

    /// Override the configured spots table name.
    #[arg(long)]
    spots_table: Option<String>,

    /// Override the configured noise table name.
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

/// §4.3a: idempotently create the extraction dir, the processed-memo
/// parent dir, and the analytic-store tables. Directory creation
/// degrades to "best effort, log and continue" when run non-root.
fn setup_system(config: &IngesterConfig, store: &ClickHouseStore) -> Result<()> {
    for dir in [
        config.extraction_dir.clone(),
        config
            .processed_tbz_file
            .parent()
            .map(std::path::Path::to_path_buf)
            .unwrap_or_default(),
    ] {
        if dir.as_os_str().is_empty() {
            continue;
        }
        match std::fs::create_dir_all(&dir) {
            Ok(()) => tracing::info!(dir = %dir.display(), "directory ready"),
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "could not create directory, continuing"),
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().enable_io().build()?;
    runtime
        .block_on(store.ensure_schema())
        .context("creating analytic-store tables")?;
    tracing::info!("analytic-store tables ready");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = IngesterConfig::load(&args.config)
        .with_context(|| format!("loading ingester config from {}", args.config.display()))?;

    let store = ClickHouseStore::new(&config, args.clickhouse_user.as_deref(), args.clickhouse_password.as_deref())
        .with_tables(args.spots_table.clone(), args.noise_table.clone());

    if args.setup_system {
        return setup_system(&config, &store);
    }

    let store: Arc<dyn SpotStore> = Arc::new(store);
    let ingester = Ingester::new(config, store)?;

    match args.r#loop {
        None => {
            let stats = ingester.run_cycle(args.dry_run)?;
            tracing::info!(?stats, "ingest cycle complete");
        }
        Some(secs) => {
            let stop = Arc::new(wsprnet_relay::reflector::StopEvent::new());
            let stop_for_handler = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                tracing::info!("shutdown signal received");
                stop_for_handler.signal();
            })
            .context("installing SIGINT/SIGTERM handler")?;

            let interval = Duration::from_secs(secs);
            loop {
                let cycle = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| ingester.run_cycle(args.dry_run)));
                match cycle {
                    Ok(Ok(stats)) => tracing::info!(?stats, "ingest cycle complete"),
                    Ok(Err(e)) => tracing::error!(error = %e, "ingest cycle failed, continuing"),
                    Err(payload) => {
                        let msg = wsprnet_relay::core::panic::describe_panic(&*payload);
                        tracing::error!(panic = %msg, "ingest cycle panicked, continuing");
                    }
                }
                if stop.wait_timeout(interval) {
                    break;
                }
            }
        }
    }

    Ok(())
}
