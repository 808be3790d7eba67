//! Stage A: bundle distribution. One Scanner thread plus one RsyncWorker
//! thread per destination, coordinated only by a single write-once stop
//! event (§5 concurrency model) — no other cross-thread mutable state.

pub mod globbing;
pub mod inode_state;
pub mod queue;
pub mod rsync_worker;
pub mod scanner;

use crate::config::ReflectorConfig;
use queue::QueueManager;
use rsync_worker::RsyncWorker;
use scanner::Scanner;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Write-once-from-signal-handler, read-by-all-threads stop flag, paired
/// with a condvar so workers can sleep between cycles without polling.
pub struct StopEvent {
    flag: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl StopEvent {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep up to `timeout`, waking early if the stop event fires.
    /// Returns `true` if the stop event is now set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        let guard = self.mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (_guard, _result) = self
            .condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.is_set()
    }
}

impl Default for StopEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the Reflector to completion: spawns the Scanner and RsyncWorker
/// threads, blocks until `stop` fires, then joins with a 5-second cap per
/// thread (remaining daemons die with the process, per §5 cancellation).
pub fn run(config: ReflectorConfig, stop: Arc<StopEvent>, dry_run: bool, single_shot: bool) {
    let queue_manager = Arc::new(QueueManager::new(
        config.queue_base_dir.clone(),
        config.local_max_used_percent,
        config.queue_purge_batch,
    ));

    let scan_interval = Duration::from_secs(config.scan_interval);
    let rsync_interval = Duration::from_secs(config.rsync_interval);
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval);

    let mut workers = Vec::new();
    for dest in config.destinations.clone() {
        let queue_base = config.queue_base_dir.clone();
        let bandwidth_limit = config.rsync_bandwidth_limit;
        let rsync_timeout = config.rsync_timeout;
        let min_free = config.min_free_space_percent;
        let skip_check = config.skip_rsync_check;
        let stop = Arc::clone(&stop);

        workers.push(thread::spawn(move || {
            let mut worker = RsyncWorker::new(dest, &queue_base, bandwidth_limit, rsync_timeout, min_free, skip_check);
            worker.boot_probe();
            loop {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| worker.run_cycle())) {
                    Ok(outcome) => tracing::debug!(?outcome, "rsync worker cycle complete"),
                    Err(payload) => {
                        let msg = crate::core::panic::describe_panic(&*payload);
                        tracing::error!(panic = %msg, "rsync worker cycle panicked, continuing");
                    }
                }
                if single_shot || stop.wait_timeout(rsync_interval) {
                    break;
                }
            }
        }));
    }

    let scanner_stop = Arc::clone(&stop);
    let scanner_handle = thread::spawn(move || {
        let mut scanner = Scanner::new(config, Arc::clone(&queue_manager));
        let mut last_heartbeat = std::time::Instant::now();
        let mut since_heartbeat = scanner::CycleStats::default();

        loop {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scanner.run_cycle(dry_run))) {
                Ok(Ok(stats)) => merge_stats(&mut since_heartbeat, stats),
                Ok(Err(e)) => tracing::error!(error = %e, "scan cycle failed, continuing"),
                Err(payload) => {
                    let msg = crate::core::panic::describe_panic(&*payload);
                    tracing::error!(panic = %msg, "scan cycle panicked, continuing");
                }
            }

            if last_heartbeat.elapsed() >= heartbeat_interval {
                info!(
                    fanned_out = since_heartbeat.fanned_out,
                    validated_corrupt = since_heartbeat.validated_corrupt,
                    quarantined = since_heartbeat.quarantined,
                    queue_sizes = ?queue_manager.queue_sizes(),
                    "reflector heartbeat"
                );
                since_heartbeat = scanner::CycleStats::default();
                last_heartbeat = std::time::Instant::now();
            }

            if single_shot || scanner_stop.wait_timeout(scan_interval) {
                break;
            }
        }
    });

    let _ = scanner_handle.join();
    for w in workers {
        let _ = w.join();
    }
}

fn merge_stats(total: &mut scanner::CycleStats, cycle: scanner::CycleStats) {
    total.candidates_seen += cycle.candidates_seen;
    total.deleted_by_pattern += cycle.deleted_by_pattern;
    total.validated_ok += cycle.validated_ok;
    total.validated_corrupt += cycle.validated_corrupt;
    total.validated_inconclusive += cycle.validated_inconclusive;
    total.fanned_out += cycle.fanned_out;
    total.fanout_partial += cycle.fanout_partial;
    total.quarantined += cycle.quarantined;
}
