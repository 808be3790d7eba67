//! Reflector.RsyncWorker (§4.2): drains one destination's queue directory
//! to its remote host and removes transferred files from the local queue.

use crate::config::Destination;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{error, warn};
use wait_timeout::ChildExt;
use which::which;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_SKIP_LOG_INTERVAL: Duration = Duration::from_secs(300);

pub struct RsyncWorker {
    destination: Destination,
    queue_dir: PathBuf,
    bandwidth_limit_kbps: u64,
    rsync_timeout: Duration,
    min_free_space_percent: f64,
    skip_rsync_check: bool,
    /// Disabled for the process lifetime if the transfer tool could not be
    /// found or installed at boot (§4.2 "Boot-time probe").
    disabled: bool,
    last_space_log: Mutex<Option<Instant>>,
}

/// Outcome of one worker cycle, surfaced for heartbeat/test purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    QueueEmpty,
    Disabled,
    SkippedProbeFailed,
    SkippedInsufficientSpace,
    Transferred,
    TransferFailed(String),
}

impl RsyncWorker {
    #[must_use]
    pub fn new(
        destination: Destination,
        queue_base_dir: &Path,
        bandwidth_limit_kbps: u64,
        rsync_timeout_secs: u64,
        min_free_space_percent: f64,
        skip_rsync_check: bool,
    ) -> Self {
        let queue_dir = queue_base_dir.join(&destination.name);
        Self {
            destination,
            queue_dir,
            bandwidth_limit_kbps,
            rsync_timeout: Duration::from_secs(rsync_timeout_secs),
            min_free_space_percent,
            skip_rsync_check,
            disabled: false,
            last_space_log: Mutex::new(None),
        }
    }

    /// Verify `rsync` is reachable; attempt `apt`/`yum` install on failure.
    /// Disables the worker for the process lifetime if still absent.
    pub fn boot_probe(&mut self) {
        if which("rsync").is_ok() {
            return;
        }
        warn!(destination = %self.destination.name, "rsync not found, attempting install");
        for installer in ["apt-get", "yum"] {
            if which(installer).is_err() {
                continue;
            }
            let status = Command::new(installer)
                .args(["install", "-y", "rsync"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if matches!(status, Ok(s) if s.success()) && which("rsync").is_ok() {
                return;
            }
        }
        error!(destination = %self.destination.name, "rsync unavailable, disabling destination");
        self.disabled = true;
    }

    pub fn run_cycle(&self) -> CycleOutcome {
        if self.disabled {
            return CycleOutcome::Disabled;
        }
        if queue_is_empty(&self.queue_dir) {
            return CycleOutcome::QueueEmpty;
        }

        match self.probe_remote_free_percent() {
            None => {
                if !self.skip_rsync_check {
                    self.log_space_skip("remote free-space probe failed");
                    return CycleOutcome::SkippedProbeFailed;
                }
            }
            Some(pct) if pct < self.min_free_space_percent => {
                self.log_space_skip("remote free space below threshold");
                return CycleOutcome::SkippedInsufficientSpace;
            }
            Some(_) => {}
        }

        self.transfer()
    }

    fn probe_remote_free_percent(&self) -> Option<f64> {
        let target = format!("{}@{}", self.destination.user, self.destination.host);
        let mut cmd = Command::new("ssh");
        if let Some(key) = &self.destination.ssh_key {
            cmd.arg("-i").arg(key);
        }
        cmd.arg(&target)
            .arg("df -P . | tail -1 | awk '{print 100-$5}'")
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().ok()?;
        let status = child.wait_timeout(PROBE_TIMEOUT).ok()??;
        if !status.success() {
            return None;
        }
        let mut out = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            use std::io::Read;
            let _ = stdout.read_to_string(&mut out);
        }
        out.trim().trim_end_matches('%').parse().ok()
    }

    fn transfer(&self) -> CycleOutcome {
        let remote_target = format!(
            "{}@{}:{}",
            self.destination.user, self.destination.host, self.destination.path
        );

        let mut cmd = Command::new("rsync");
        cmd.arg("-a")
            .arg("--remove-source-files")
            .arg("--exclude=.*")
            .arg(format!("--timeout={}", self.rsync_timeout.as_secs()));
        if self.bandwidth_limit_kbps > 0 {
            cmd.arg(format!("--bwlimit={}", self.bandwidth_limit_kbps));
        }
        if let Some(key) = &self.destination.ssh_key {
            cmd.arg("-e").arg(format!("ssh -i {}", key.display()));
        }
        cmd.arg(format!("{}/", self.queue_dir.display()))
            .arg(&remote_target)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return CycleOutcome::TransferFailed(e.to_string()),
        };

        let outer_cap = self.rsync_timeout + Duration::from_secs(30);
        match child.wait_timeout(outer_cap) {
            Ok(Some(status)) if status.success() => CycleOutcome::Transferred,
            Ok(Some(status)) => {
                let mut stderr = String::new();
                if let Some(mut s) = child.stderr.take() {
                    use std::io::Read;
                    let _ = s.read_to_string(&mut stderr);
                }
                CycleOutcome::TransferFailed(format!("exit {status}: {stderr}"))
            }
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                CycleOutcome::TransferFailed("transfer timed out".to_string())
            }
            Err(e) => CycleOutcome::TransferFailed(e.to_string()),
        }
    }

    fn log_space_skip(&self, reason: &str) {
        let mut last = self.last_space_log.lock();
        let should_log = last.is_none_or(|t| t.elapsed() >= PROBE_SKIP_LOG_INTERVAL);
        if should_log {
            warn!(destination = %self.destination.name, reason, "skipping transfer cycle");
            *last = Some(Instant::now());
        }
    }
}

fn queue_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut rd| rd.next().is_none())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn dest() -> Destination {
        Destination {
            name: "dest-a".to_string(),
            user: "wspr".to_string(),
            host: "127.0.0.1".to_string(),
            path: "/incoming".to_string(),
            ssh_key: None,
        }
    }

    #[test]
    fn empty_queue_short_circuits() {
        let base = tempdir().unwrap();
        fs::create_dir_all(base.path().join("dest-a")).unwrap();
        let worker = RsyncWorker::new(dest(), base.path(), 0, 30, 10.0, false);
        assert_eq!(worker.run_cycle(), CycleOutcome::QueueEmpty);
    }

    #[test]
    fn disabled_worker_never_runs() {
        let base = tempdir().unwrap();
        fs::create_dir_all(base.path().join("dest-a")).unwrap();
        fs::write(base.path().join("dest-a/x.tbz"), b"data").unwrap();
        let mut worker = RsyncWorker::new(dest(), base.path(), 0, 30, 10.0, false);
        worker.disabled = true;
        assert_eq!(worker.run_cycle(), CycleOutcome::Disabled);
    }

    #[test]
    fn unreachable_probe_host_skips_without_transfer() {
        let base = tempdir().unwrap();
        fs::create_dir_all(base.path().join("dest-a")).unwrap();
        fs::write(base.path().join("dest-a/x.tbz"), b"data").unwrap();
        let mut bad_dest = dest();
        bad_dest.host = "198.51.100.1".to_string(); // TEST-NET-2, unreachable
        let worker = RsyncWorker::new(bad_dest, base.path(), 0, 1, 10.0, false);
        let outcome = worker.run_cycle();
        assert!(matches!(
            outcome,
            CycleOutcome::SkippedProbeFailed | CycleOutcome::TransferFailed(_)
        ));
        let _ = worker;
    }
}
