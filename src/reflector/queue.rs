//! QueueManager (§4.6): reactive backpressure against local disk exhaustion.

use crate::core::disk::used_percent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);
const LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct QueueManager {
    queue_base_dir: PathBuf,
    local_max_used_percent: f64,
    queue_purge_batch: usize,
    last_check: Mutex<Option<Instant>>,
    last_log: Mutex<Option<Instant>>,
}

impl QueueManager {
    #[must_use]
    pub fn new(queue_base_dir: PathBuf, local_max_used_percent: f64, queue_purge_batch: usize) -> Self {
        Self {
            queue_base_dir,
            local_max_used_percent,
            queue_purge_batch,
            last_check: Mutex::new(None),
            last_log: Mutex::new(None),
        }
    }

    /// Rate-limited to once every 30s; no-op between checks. Returns the
    /// number of files purged this call (0 if skipped or under watermark).
    pub fn check_and_purge_if_needed(&self) -> usize {
        {
            let mut last = self.last_check.lock();
            if let Some(t) = *last {
                if t.elapsed() < CHECK_INTERVAL {
                    return 0;
                }
            }
            *last = Some(Instant::now());
        }

        match used_percent(&self.queue_base_dir) {
            Some(pct) if pct > self.local_max_used_percent => {
                self.log_pressure(pct);
                self.purge_from_largest_queue()
            }
            _ => 0,
        }
    }

    /// Called immediately on ENOSPC during fan-out, bypassing the rate
    /// limit: disk is already full, no point waiting for the next tick.
    pub fn purge_from_largest_queue(&self) -> usize {
        let Some(largest) = self.largest_queue_by_file_count() else {
            return 0;
        };
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = match fs::read_dir(&largest) {
            Ok(rd) => rd
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "tbz"))
                .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|m| (e.path(), m)))
                .collect(),
            Err(_) => return 0,
        };
        entries.sort_by_key(|(_, mtime)| *mtime);

        let mut purged = 0;
        for (path, _) in entries.into_iter().take(self.queue_purge_batch) {
            if fs::remove_file(&path).is_ok() {
                purged += 1;
            }
        }
        purged
    }

    /// Per-destination `.tbz` queue depth, keyed by destination subdirectory
    /// name, for heartbeat reporting (§4.1a).
    #[must_use]
    pub fn queue_sizes(&self) -> HashMap<String, usize> {
        let Ok(rd) = fs::read_dir(&self.queue_base_dir) else {
            return HashMap::new();
        };
        rd.filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some((name, tbz_count(&p)))
            })
            .collect()
    }

    fn largest_queue_by_file_count(&self) -> Option<PathBuf> {
        let dirs: Vec<PathBuf> = fs::read_dir(&self.queue_base_dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();

        dirs.into_iter().max_by_key(|d| tbz_count(d))
    }

    fn log_pressure(&self, pct: f64) {
        let mut last = self.last_log.lock();
        let should_log = last.is_none_or(|t| t.elapsed() >= LOG_INTERVAL);
        if should_log {
            warn!(used_percent = pct, "queue base filesystem under pressure, purging largest queue");
            *last = Some(Instant::now());
        }
    }
}

fn tbz_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "tbz"))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn purge_removes_oldest_files_first() {
        let base = tempdir().unwrap();
        let dest = base.path().join("dest-a");
        fs::create_dir_all(&dest).unwrap();

        for i in 0..5 {
            let path = dest.join(format!("{i}.tbz"));
            let mut f = File::create(&path).unwrap();
            writeln!(f, "x").unwrap();
            // Ensure distinct mtimes in the absence of real time control.
            std::thread::sleep(Duration::from_millis(5));
        }

        let qm = QueueManager::new(base.path().to_path_buf(), 80.0, 3);
        let purged = qm.purge_from_largest_queue();
        assert_eq!(purged, 3);
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 2);
    }

    #[test]
    fn empty_queue_base_purges_nothing() {
        let base = tempdir().unwrap();
        let qm = QueueManager::new(base.path().to_path_buf(), 80.0, 10);
        assert_eq!(qm.purge_from_largest_queue(), 0);
    }

    #[test]
    fn queue_sizes_reports_per_destination_tbz_counts() {
        let base = tempdir().unwrap();
        fs::create_dir_all(base.path().join("dest-a")).unwrap();
        fs::create_dir_all(base.path().join("dest-b")).unwrap();
        File::create(base.path().join("dest-a").join("1.tbz")).unwrap();
        File::create(base.path().join("dest-a").join("2.tbz")).unwrap();
        File::create(base.path().join("dest-b").join("1.tbz")).unwrap();

        let qm = QueueManager::new(base.path().to_path_buf(), 80.0, 10);
        let sizes = qm.queue_sizes();
        assert_eq!(sizes.get("dest-a"), Some(&2));
        assert_eq!(sizes.get("dest-b"), Some(&1));
    }

    #[test]
    fn rate_limit_skips_repeated_calls() {
        let base = tempdir().unwrap();
        let qm = QueueManager::new(base.path().to_path_buf(), 0.0, 10);
        qm.check_and_purge_if_needed();
        assert_eq!(qm.check_and_purge_if_needed(), 0);
    }
}
