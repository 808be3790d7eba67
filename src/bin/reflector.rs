//! wsprnet-reflector: Stage A distribution daemon.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wsprnet_relay::config::ReflectorConfig;
use wsprnet_relay::reflector::{self, StopEvent};

/// Fans bundles out from upload directories to downstream queue dirs.
#[derive(Parser, Debug)]
#[command(name = "wsprnet-reflector", version, about)]
struct Args {
    /// Path to the reflector JSON configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Parse and validate but never copy/link/delete.
    #[arg(long)]
    dry_run: bool,

    /// Run forever, sleeping SECONDS between cycles (overrides the
    /// config's `scan_interval`/`rsync_interval`). Absent means run a
    /// single scan/transfer cycle and exit.
    #[arg(long, value_name = "SECONDS")]
    r#loop: Option<u64>,
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

    let mut config = ReflectorConfig::load(&args.config)
        .with_context(|| format!("loading reflector config from {}", args.config.display()))?;

    if config.destinations.is_empty() {
        anyhow::bail!("reflector config has no destinations configured");
    }

    let single_shot = args.r#loop.is_none();
    if let Some(secs) = args.r#loop {
        config.scan_interval = secs;
        config.rsync_interval = secs;
    }

    let stop = Arc::new(StopEvent::new());
    let stop_for_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        stop_for_handler.signal();
    })
    .context("installing SIGINT/SIGTERM handler")?;

    tracing::info!(destinations = config.destinations.len(), "starting reflector");
    reflector::run(config, stop, args.dry_run, single_shot);
    tracing::info!("reflector shut down");
    Ok(())
}
