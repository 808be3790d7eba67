//! BatchLoader: degenerate case of the ingestion engine (§4.3 BatchLoader
//! variant) for historical backfill from tar-of-tbz archives. Inner tbz
//! bodies are read fully into memory — no extraction scratch directory —
//! and records accumulate across many inner bundles before flushing.

pub mod state;

use crate::core::archive::read_tbz_members;
use crate::core::{InsertOutcome, Result};
use crate::parsers::{
    band_str_to_meters, decode_rx_site_dir, noise_timestamp_from_filename, parse_noise_body,
    parse_spot_line, NoiseContext, SpotContext,
};
use crate::store::{insert_with_retry, NoiseRecord, SpotRecord, SpotStore};
use state::BatchLoaderState;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub inner_bundles_processed: usize,
    pub spots_inserted: u64,
    pub noise_inserted: u64,
    pub outer_tars_completed: usize,
}

pub struct BatchLoader {
    batch_size: usize,
    state_path: PathBuf,
    store: Arc<dyn SpotStore>,
    runtime: Runtime,
}

impl BatchLoader {
    pub fn new(state_path: PathBuf, batch_size: usize, store: Arc<dyn SpotStore>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().enable_io().build()?;
        Ok(Self {
            batch_size: batch_size.max(1),
            state_path,
            store,
            runtime,
        })
    }

    pub fn run(
        &self,
        tar_paths: &[PathBuf],
        limit: Option<usize>,
        reset: bool,
        dry_run: bool,
    ) -> Result<RunStats> {
        if reset {
            BatchLoaderState::reset(&self.state_path)?;
        }
        let mut state = BatchLoaderState::load(&self.state_path)?;
        let mut stats = RunStats::default();
        let mut spot_buf: Vec<SpotRecord> = Vec::new();
        let mut noise_buf: Vec<NoiseRecord> = Vec::new();
        let mut processed_count = 0usize;

        for tar_path in tar_paths {
            let pathname = tar_path.to_string_lossy().into_owned();
            if state.is_outer_tar_complete(&pathname) {
                continue;
            }

            let bundles_before = stats.inner_bundles_processed;
            let spots_before = stats.spots_inserted;
            let noise_before = stats.noise_inserted;

            let file = File::open(tar_path)?;
            let mut archive = Archive::new(file);
            let mut hit_limit = false;

            for entry in archive.entries()? {
                let mut entry = entry?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let member_name = entry.path()?.to_string_lossy().into_owned();
                if !member_name.ends_with(".tbz") {
                    continue;
                }
                if limit.is_some_and(|l| processed_count >= l) {
                    hit_limit = true;
                    break;
                }

                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;

                match process_inner_tbz(&bytes, &mut spot_buf, &mut noise_buf) {
                    Ok(()) => {
                        processed_count += 1;
                        stats.inner_bundles_processed += 1;
                    }
                    Err(e) => warn!(member = %member_name, error = %e, "skipping unreadable inner bundle"),
                }

                if spot_buf.len() >= self.batch_size {
                    self.flush_spots(&mut spot_buf, dry_run, &mut stats)?;
                }
                if noise_buf.len() >= self.batch_size {
                    self.flush_noise(&mut noise_buf, dry_run, &mut stats)?;
                }
            }

            self.flush_spots(&mut spot_buf, dry_run, &mut stats)?;
            self.flush_noise(&mut noise_buf, dry_run, &mut stats)?;

            if hit_limit {
                state.save(&self.state_path)?;
                info!(tar = %pathname, "limit reached mid-tar, not marking complete");
                return Ok(stats);
            }

            state.mark_outer_tar_complete(&pathname);
            state.total_inner_bundles += (stats.inner_bundles_processed - bundles_before) as u64;
            state.total_spots += stats.spots_inserted - spots_before;
            state.total_noise += stats.noise_inserted - noise_before;
            state.save(&self.state_path)?;
            stats.outer_tars_completed += 1;

            if limit.is_some_and(|l| processed_count >= l) {
                return Ok(stats);
            }
        }

        Ok(stats)
    }

    fn flush_spots(&self, buf: &mut Vec<SpotRecord>, dry_run: bool, stats: &mut RunStats) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if !dry_run {
            let outcome = self
                .runtime
                .block_on(insert_with_retry(|| self.store.insert_spots(buf)));
            if !matches!(outcome, InsertOutcome::Ok) {
                warn!("spot batch insert failed after retries, records dropped from this batch");
            }
        }
        stats.spots_inserted += buf.len() as u64;
        buf.clear();
        Ok(())
    }

    fn flush_noise(&self, buf: &mut Vec<NoiseRecord>, dry_run: bool, stats: &mut RunStats) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if !dry_run {
            let outcome = self
                .runtime
                .block_on(insert_with_retry(|| self.store.insert_noise(buf)));
            if !matches!(outcome, InsertOutcome::Ok) {
                warn!("noise batch insert failed after retries, records dropped from this batch");
            }
        }
        stats.noise_inserted += buf.len() as u64;
        buf.clear();
        Ok(())
    }
}

/// `wsprdaemon/{spots,noise}/<RX_SITE>/<RECEIVER>/<BAND>/<filename>`
struct MemberPath {
    kind: String,
    rx_sign: String,
    rx_loc: String,
    rx_id: String,
    band_str: String,
    band_m: i32,
    filename: String,
}

fn decode_member_path(path: &str) -> Option<MemberPath> {
    let parts: Vec<&str> = path.split('/').collect();
    let idx = parts.iter().position(|p| *p == "wsprdaemon")?;
    let kind = (*parts.get(idx + 1)?).to_string();
    let rx_site = parts.get(idx + 2)?;
    let receiver = parts.get(idx + 3)?;
    let band = parts.get(idx + 4)?;
    let filename = (*parts.get(idx + 5)?).to_string();

    let (rx_sign, rx_loc) = decode_rx_site_dir(rx_site);
    let band_m = band_str_to_meters(band)?;

    Some(MemberPath {
        kind,
        rx_sign,
        rx_loc,
        rx_id: (*receiver).to_string(),
        band_str: (*band).to_string(),
        band_m,
        filename,
    })
}

fn process_inner_tbz(bytes: &[u8], spot_buf: &mut Vec<SpotRecord>, noise_buf: &mut Vec<NoiseRecord>) -> Result<()> {
    let members = read_tbz_members(bytes)?;

    let client_version = members
        .iter()
        .find(|(p, _)| p.ends_with("uploads_config.txt"))
        .and_then(|(_, content)| String::from_utf8(content.clone()).ok())
        .and_then(|content| crate::ingester::extraction::parse_uploads_config(&content).client_version);

    for (path, bytes) in &members {
        let Some(member) = decode_member_path(path) else {
            continue;
        };
        let Ok(content) = std::str::from_utf8(bytes) else {
            continue;
        };

        if member.kind == "spots" && member.filename.ends_with("_spots.txt") {
            let ctx = SpotContext {
                rx_id: &member.rx_id,
                dir_rx_sign: &member.rx_sign,
                dir_rx_loc: &member.rx_loc,
                band_m: member.band_m,
                client_version: client_version.as_deref(),
            };
            for line in content.lines() {
                if let Some(rec) = parse_spot_line(line, &ctx) {
                    spot_buf.push(rec);
                }
            }
        } else if member.kind == "noise" && member.filename.ends_with("_noise.txt") {
            if let Some(ts) = noise_timestamp_from_filename(&member.filename) {
                let ctx = NoiseContext {
                    site: &member.rx_sign,
                    receiver: &member.rx_id,
                    rx_loc: &member.rx_loc,
                    band: &member.band_str,
                };
                if let Some(rec) = parse_noise_body(content, ts, &ctx) {
                    noise_buf.push(rec);
                }
            }
        }
    }

    Ok(())
}

/// Collect the tar-of-tbz archives to process from either a single
/// `--tar` path or every `*.tar` in `--tar-dir`.
#[must_use]
pub fn resolve_tar_paths(tar: Option<&Path>, tar_dir: Option<&Path>) -> Vec<PathBuf> {
    if let Some(t) = tar {
        return vec![t.to_path_buf()];
    }
    let Some(dir) = tar_dir else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "tar"))
        .collect();
    paths.sort();
    paths
}
