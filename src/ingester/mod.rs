//! Stage B: drain incoming directories of bundles into the analytic
//! store. Single-threaded loop (§5) driving one async store client via a
//! current-thread tokio runtime — the only async surface in the pipeline.

pub mod extraction;
pub mod processed_memo;

use crate::config::IngesterConfig;
use crate::core::archive::extract_tbz;
use crate::core::{InsertOutcome, Result};
use crate::parsers::{parse_noise_body, parse_spot_line, NoiseContext, SpotContext};
use crate::store::{NoiseRecord, SpotRecord, SpotStore};
use extraction::{discover_files, parse_uploads_config};
use processed_memo::ProcessedMemo;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub zombies_removed: usize,
    pub bundles_processed: usize,
    pub bundles_deferred: usize,
    pub bundles_dropped_corrupt: usize,
    pub spots_inserted: usize,
    pub noise_inserted: usize,
}

enum BundleOutcome {
    Inserted { spots: usize, noise: usize },
    InsertFailed,
}

pub struct Ingester {
    config: IngesterConfig,
    store: Arc<dyn SpotStore>,
    memo: ProcessedMemo,
    runtime: Runtime,
}

impl Ingester {
    pub fn new(config: IngesterConfig, store: Arc<dyn SpotStore>) -> Result<Self> {
        let memo = ProcessedMemo::new(config.processed_tbz_file.clone(), config.max_processed_file_size);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .enable_io()
            .build()?;
        Ok(Self { config, store, memo, runtime })
    }

    pub fn run_cycle(&self, dry_run: bool) -> Result<CycleStats> {
        let mut stats = CycleStats::default();
        let processed = self.memo.load()?;

        let _ = fs::create_dir_all(&self.config.extraction_dir);

        for dir in self.config.incoming_tbz_dirs.clone() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.filter_map(std::result::Result::ok) {
                let path = entry.path();
                if !path.to_string_lossy().ends_with(".tbz") {
                    continue;
                }
                let pathname = path.to_string_lossy().into_owned();

                if processed.contains(&pathname) {
                    let _ = fs::remove_file(&path);
                    stats.zombies_removed += 1;
                    continue;
                }

                self.clear_scratch();
                match extract_tbz(&path, &self.config.extraction_dir) {
                    Ok(()) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "extraction failed, dropping unrecoverable bundle");
                        let _ = fs::remove_file(&path);
                        stats.bundles_dropped_corrupt += 1;
                        continue;
                    }
                }

                match self.process_extracted(&path, dry_run) {
                    Ok(BundleOutcome::Inserted { spots, noise }) => {
                        stats.spots_inserted += spots;
                        stats.noise_inserted += noise;
                        if !dry_run {
                            self.memo.append(&pathname)?;
                            fs::remove_file(&path)?;
                        }
                        stats.bundles_processed += 1;
                    }
                    Ok(BundleOutcome::InsertFailed) => {
                        stats.bundles_deferred += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "bundle processing error, will retry next cycle");
                        stats.bundles_deferred += 1;
                    }
                }
            }
        }

        self.clear_scratch();
        Ok(stats)
    }

    fn clear_scratch(&self) {
        let _ = fs::remove_dir_all(&self.config.extraction_dir);
        let _ = fs::create_dir_all(&self.config.extraction_dir);
    }

    fn process_extracted(&self, bundle_path: &Path, dry_run: bool) -> Result<BundleOutcome> {
        let uploads_config_path = self.config.extraction_dir.join("uploads_config.txt");
        let client_version = fs::read_to_string(&uploads_config_path)
            .ok()
            .and_then(|content| parse_uploads_config(&content).client_version);

        let spot_files = discover_files(&self.config.extraction_dir, "spots", "_spots.txt");
        let noise_files = discover_files(&self.config.extraction_dir, "noise", "_noise.txt");

        let mut spot_records = Vec::new();
        for f in &spot_files {
            let Ok(content) = fs::read_to_string(&f.path) else {
                continue;
            };
            let ctx = SpotContext {
                rx_id: &f.rx_id,
                dir_rx_sign: &f.rx_sign,
                dir_rx_loc: &f.rx_loc,
                band_m: f.band_m,
                client_version: client_version.as_deref(),
            };
            for line in content.lines() {
                match parse_spot_line(line, &ctx) {
                    Some(rec) => spot_records.push(rec),
                    None => debug!(path = %f.path.display(), "skipping malformed spot line"),
                }
            }
        }

        let mut noise_records = Vec::new();
        for f in &noise_files {
            let Some(filename) = f.path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(ts) = crate::parsers::noise_timestamp_from_filename(&filename) else {
                debug!(path = %f.path.display(), "noise filename does not match expected pattern");
                continue;
            };
            let Ok(content) = fs::read_to_string(&f.path) else {
                continue;
            };
            let ctx = NoiseContext {
                site: &f.rx_sign,
                receiver: &f.rx_id,
                rx_loc: &f.rx_loc,
                band: &f.band_str,
            };
            match parse_noise_body(&content, ts, &ctx) {
                Some(rec) => noise_records.push(rec),
                None => debug!(path = %f.path.display(), "noise file body does not have 15 tokens"),
            }
        }

        if dry_run {
            info!(
                spots = spot_records.len(),
                noise = noise_records.len(),
                path = %bundle_path.display(),
                "dry-run: parsed bundle, not inserting"
            );
            return Ok(BundleOutcome::Inserted { spots: 0, noise: 0 });
        }

        let spots_ok = self.insert_all_spots(&spot_records)?;
        let noise_ok = self.insert_all_noise(&noise_records)?;

        if spots_ok && noise_ok {
            Ok(BundleOutcome::Inserted {
                spots: spot_records.len(),
                noise: noise_records.len(),
            })
        } else {
            Ok(BundleOutcome::InsertFailed)
        }
    }

    fn insert_all_spots(&self, rows: &[SpotRecord]) -> Result<bool> {
        for chunk in rows.chunks(self.config.max_spots_per_insert.max(1)) {
            let outcome = self
                .runtime
                .block_on(crate::store::insert_with_retry(|| self.store.insert_spots(chunk)));
            if !matches!(outcome, InsertOutcome::Ok) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn insert_all_noise(&self, rows: &[NoiseRecord]) -> Result<bool> {
        for chunk in rows.chunks(self.config.max_noise_per_insert.max(1)) {
            let outcome = self
                .runtime
                .block_on(crate::store::insert_with_retry(|| self.store.insert_noise(chunk)));
            if !matches!(outcome, InsertOutcome::Ok) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeStore {
        spots_inserted: AtomicUsize,
        noise_inserted: AtomicUsize,
        fail_spots: Mutex<bool>,
    }

    #[async_trait]
    impl SpotStore for FakeStore {
        async fn insert_spots(&self, rows: &[SpotRecord]) -> InsertOutcome {
            if *self.fail_spots.lock().unwrap() {
                return InsertOutcome::Retry("forced failure".to_string());
            }
            self.spots_inserted.fetch_add(rows.len(), Ordering::SeqCst);
            InsertOutcome::Ok
        }
        async fn insert_noise(&self, rows: &[NoiseRecord]) -> InsertOutcome {
            self.noise_inserted.fetch_add(rows.len(), Ordering::SeqCst);
            InsertOutcome::Ok
        }
        async fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }
    }

    fn write_bundle(dir: &Path) -> std::path::PathBuf {
        let spot_line = [
            "230615", "1200", "23.0", "-12", "0.2", "14.097100", "K1AA", "FN42", "37", "0", "1",
            "2", "1024", "10", "0", "1", "30", "0", "-25.3", "-26.1", "20", "FN42", "W1XYZ",
            "1200", "90.0", "42.479", "-71.042", "90.0", "42.0", "-71.0", "42.4", "-71.1", "0",
            "0",
        ]
        .join(" ");

        let tree = tempdir().unwrap();
        let spots_dir = tree.path().join("wsprdaemon/spots/W1XYZ_FN42/KA9Q_DXE/20");
        fs::create_dir_all(&spots_dir).unwrap();
        fs::write(spots_dir.join("230615_1200_spots.txt"), spot_line).unwrap();

        let bundle_path = dir.join("X.tbz");
        let file = fs::File::create(&bundle_path).unwrap();
        let enc = bzip2::write::BzEncoder::new(file, bzip2::Compression::fast());
        let mut builder = tar::Builder::new(enc);
        builder.append_dir_all("wsprdaemon", tree.path().join("wsprdaemon")).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        bundle_path
    }

    #[test]
    fn happy_path_inserts_and_marks_processed() {
        let incoming = tempdir().unwrap();
        let extraction = tempdir().unwrap();
        write_bundle(incoming.path());

        let config = IngesterConfig {
            incoming_tbz_dirs: vec![incoming.path().to_path_buf()],
            extraction_dir: extraction.path().to_path_buf(),
            processed_tbz_file: extraction.path().join("processed.txt"),
            ..IngesterConfig::default()
        };

        let store = Arc::new(FakeStore {
            spots_inserted: AtomicUsize::new(0),
            noise_inserted: AtomicUsize::new(0),
            fail_spots: Mutex::new(false),
        });
        let ingester = Ingester::new(config, store.clone()).unwrap();
        let stats = ingester.run_cycle(false).unwrap();

        assert_eq!(stats.bundles_processed, 1);
        assert_eq!(stats.spots_inserted, 1);
        assert_eq!(store.spots_inserted.load(Ordering::SeqCst), 1);
        assert!(!incoming.path().join("X.tbz").exists());
    }

    #[test]
    fn insert_failure_leaves_bundle_for_retry() {
        let incoming = tempdir().unwrap();
        let extraction = tempdir().unwrap();
        write_bundle(incoming.path());

        let config = IngesterConfig {
            incoming_tbz_dirs: vec![incoming.path().to_path_buf()],
            extraction_dir: extraction.path().to_path_buf(),
            processed_tbz_file: extraction.path().join("processed.txt"),
            ..IngesterConfig::default()
        };

        let store = Arc::new(FakeStore {
            spots_inserted: AtomicUsize::new(0),
            noise_inserted: AtomicUsize::new(0),
            fail_spots: Mutex::new(true),
        });
        let ingester = Ingester::new(config, store).unwrap();
        let stats = ingester.run_cycle(false).unwrap();

        assert_eq!(stats.bundles_deferred, 1);
        assert!(incoming.path().join("X.tbz").exists());
    }

    #[test]
    fn rerun_over_already_processed_bundle_is_a_zombie_cleanup() {
        let incoming = tempdir().unwrap();
        let extraction = tempdir().unwrap();
        let bundle = write_bundle(incoming.path());

        let config = IngesterConfig {
            incoming_tbz_dirs: vec![incoming.path().to_path_buf()],
            extraction_dir: extraction.path().to_path_buf(),
            processed_tbz_file: extraction.path().join("processed.txt"),
            ..IngesterConfig::default()
        };

        fs::write(&config.processed_tbz_file, format!("{}\n", bundle.display())).unwrap();

        let store = Arc::new(FakeStore {
            spots_inserted: AtomicUsize::new(0),
            noise_inserted: AtomicUsize::new(0),
            fail_spots: Mutex::new(false),
        });
        let ingester = Ingester::new(config, store.clone()).unwrap();
        let stats = ingester.run_cycle(false).unwrap();

        assert_eq!(stats.zombies_removed, 1);
        assert_eq!(stats.bundles_processed, 0);
        assert_eq!(store.spots_inserted.load(Ordering::SeqCst), 0);
    }
}
