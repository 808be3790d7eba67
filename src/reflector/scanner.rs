//! Reflector.Scanner (§4.1): discovers candidate bundles, validates them,
//! fans them out to every destination, and deletes the source once every
//! destination has accepted it.

use crate::config::ReflectorConfig;
use crate::core::inode::{file_age_seconds, file_inode};
use crate::core::validate::validate_tbz_file;
use crate::core::{Result, ValidationOutcome};
use crate::reflector::globbing::{expand_path_pattern, matches_any};
use crate::reflector::inode_state::{Disposition, InodeTracker};
use crate::reflector::queue::QueueManager;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters accumulated across one scan cycle, folded into the periodic
/// heartbeat line.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub candidates_seen: usize,
    pub deleted_by_pattern: usize,
    pub validated_ok: usize,
    pub validated_corrupt: usize,
    pub validated_inconclusive: usize,
    pub fanned_out: usize,
    pub fanout_partial: usize,
    pub quarantined: usize,
}

pub struct Scanner {
    config: ReflectorConfig,
    tracker: InodeTracker,
    queue_manager: Arc<QueueManager>,
    /// Per-cycle cache, keyed by source (upload) directory, of whether that
    /// directory shares a filesystem with the first destination's queue
    /// directory — probed once per cycle per source directory rather than
    /// re-probed per file.
    hardlink_support: HashMap<PathBuf, bool>,
}

impl Scanner {
    #[must_use]
    pub fn new(config: ReflectorConfig, queue_manager: Arc<QueueManager>) -> Self {
        Self {
            config,
            tracker: InodeTracker::new(),
            queue_manager,
            hardlink_support: HashMap::new(),
        }
    }

    pub fn run_cycle(&mut self, dry_run: bool) -> Result<CycleStats> {
        let mut stats = CycleStats::default();
        self.hardlink_support.clear();

        let upload_dirs = expand_path_pattern(&self.config.incoming_pattern);
        let mut candidates = Vec::new();
        for dir in &upload_dirs {
            if candidates.len() >= self.config.max_files_per_scan {
                break;
            }
            self.walk_dir(dir, &mut candidates, &mut stats, dry_run);
        }

        for path in candidates {
            stats.candidates_seen += 1;
            if let Err(e) = self.process_candidate(&path, dry_run, &mut stats) {
                warn!(path = %path.display(), error = %e, "scan candidate failed, will retry next cycle");
            }
        }

        Ok(stats)
    }

    fn walk_dir(&self, dir: &Path, candidates: &mut Vec<PathBuf>, stats: &mut CycleStats, dry_run: bool) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable subtree");
                return;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            if candidates.len() >= self.config.max_files_per_scan {
                return;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                self.walk_dir(&path, candidates, stats, dry_run);
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();

            if matches_any(&name, &self.config.delete_patterns) {
                if dry_run {
                    debug!(path = %path.display(), "dry-run: would delete per delete_patterns");
                } else if fs::remove_file(&path).is_ok() {
                    stats.deleted_by_pattern += 1;
                }
                continue;
            }

            if name.ends_with(".tbz") {
                candidates.push(path);
            }
        }
    }

    fn process_candidate(&mut self, path: &Path, dry_run: bool, stats: &mut CycleStats) -> Result<()> {
        let Some(inode) = file_inode(path) else {
            return Ok(());
        };

        let corrupt_min_age = Duration::from_secs(self.config.corrupt_min_age_seconds);
        match self.tracker.disposition(inode, corrupt_min_age) {
            Disposition::FanOutDirectly => self.fan_out(path, inode, dry_run, stats),
            Disposition::AwaitHoldDown => Ok(()),
            Disposition::QuarantineNow => {
                self.quarantine_or_delete(path, dry_run)?;
                self.tracker.forget(inode);
                stats.quarantined += 1;
                Ok(())
            }
            Disposition::SkipBackingOff => {
                self.tracker.mark_inconclusive(inode);
                Ok(())
            }
            Disposition::Unknown => {
                let age = file_age_seconds(path);
                if age < self.config.min_age_seconds as f64 {
                    return Ok(());
                }
                self.validate_and_act(path, inode, dry_run, stats)
            }
        }
    }

    fn validate_and_act(&mut self, path: &Path, inode: u64, dry_run: bool, stats: &mut CycleStats) -> Result<()> {
        let timeout = Duration::from_secs(self.config.tar_timeout);
        match validate_tbz_file(path, timeout) {
            ValidationOutcome::Valid => {
                self.tracker.mark_validated(inode);
                stats.validated_ok += 1;
                self.fan_out(path, inode, dry_run, stats)
            }
            ValidationOutcome::Corrupt(reason) => {
                warn!(path = %path.display(), reason, "bundle failed validation, marking corrupt");
                self.tracker.mark_corrupt(inode);
                stats.validated_corrupt += 1;
                Ok(())
            }
            ValidationOutcome::Inconclusive(reason) => {
                debug!(path = %path.display(), reason, "validation inconclusive, will retry with back-off");
                self.tracker.mark_inconclusive(inode);
                stats.validated_inconclusive += 1;
                Ok(())
            }
        }
    }

    fn quarantine_or_delete(&self, path: &Path, dry_run: bool) -> Result<()> {
        if dry_run {
            debug!(path = %path.display(), "dry-run: would quarantine/delete corrupt bundle");
            return Ok(());
        }
        if let Some(quarantine_dir) = &self.config.quarantine_dir {
            fs::create_dir_all(quarantine_dir)?;
            let dest = quarantine_dir.join(path.file_name().unwrap_or_default());
            if fs::rename(path, &dest).is_err() {
                fs::copy(path, &dest)?;
                fs::remove_file(path)?;
            }
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Copy/link this bundle into every destination's queue directory.
    /// Deletes the source only when every destination already has (or now
    /// has) the file.
    fn fan_out(&mut self, path: &Path, inode: u64, dry_run: bool, stats: &mut CycleStats) -> Result<()> {
        let filename = path.file_name().unwrap_or_default();
        let mut all_succeeded = true;

        for dest in self.config.destinations.clone() {
            let dest_queue = self.config.queue_base_dir.join(&dest.name);
            if dry_run {
                continue;
            }
            if let Err(e) = fs::create_dir_all(&dest_queue) {
                warn!(destination = %dest.name, error = %e, "cannot create queue dir, destination left pending");
                all_succeeded = false;
                continue;
            }
            let final_path = dest_queue.join(filename);
            if final_path.exists() {
                continue;
            }
            match self.place_in_queue(path, &final_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::StorageFull => {
                    warn!(destination = %dest.name, "ENOSPC during fan-out, triggering queue purge");
                    self.queue_manager.purge_from_largest_queue();
                    all_succeeded = false;
                }
                Err(e) => {
                    warn!(destination = %dest.name, error = %e, "fan-out to destination failed");
                    all_succeeded = false;
                }
            }
        }

        if dry_run {
            debug!(path = %path.display(), "dry-run: would fan out to all destinations");
            return Ok(());
        }

        if all_succeeded {
            fs::remove_file(path)?;
            self.tracker.forget(inode);
            stats.fanned_out += 1;
            info!(path = %path.display(), "bundle fanned out to all destinations, source removed");
        } else {
            stats.fanout_partial += 1;
        }

        Ok(())
    }

    fn place_in_queue(&mut self, source: &Path, final_path: &Path) -> std::io::Result<()> {
        let source_dir = source.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        if self.destination_supports_hardlink(&source_dir) {
            match fs::hard_link(source, final_path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::CrossesDevices => {}
                Err(e) => return Err(e),
            }
        }

        let tmp_path = final_path.with_file_name(format!(
            ".{}.tmp",
            final_path.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::copy(source, &tmp_path)?;
        fs::rename(&tmp_path, final_path)
    }

    /// §4.1b: probe once per scan cycle per source directory by attempting
    /// (and immediately removing) a throwaway hard link from `source_dir`
    /// into the first destination's queue directory, caching the result
    /// for the rest of the cycle rather than re-probing per file.
    fn destination_supports_hardlink(&mut self, source_dir: &Path) -> bool {
        if let Some(&known) = self.hardlink_support.get(source_dir) {
            return known;
        }
        let supported = self.probe_hardlink_support(source_dir);
        self.hardlink_support.insert(source_dir.to_path_buf(), supported);
        supported
    }

    fn probe_hardlink_support(&self, source_dir: &Path) -> bool {
        let Some(first_dest) = self.config.destinations.first() else {
            return false;
        };
        let dest_queue = self.config.queue_base_dir.join(&first_dest.name);
        if fs::create_dir_all(&dest_queue).is_err() {
            return false;
        }

        let probe_name = format!(".hardlink_probe.{}", std::process::id());
        let probe_source = source_dir.join(&probe_name);
        if fs::write(&probe_source, []).is_err() {
            return false;
        }
        let probe_dest = dest_queue.join(&probe_name);
        let supported = fs::hard_link(&probe_source, &probe_dest).is_ok();
        let _ = fs::remove_file(&probe_dest);
        let _ = fs::remove_file(&probe_source);
        supported
    }
}
