//! Tar-archive content validator.
//!
//! Spawns `tar tf <path>` in its own process group so a timeout can kill the
//! whole tree (tar may fork a decompression helper). Exit code and stderr
//! text decide whether the bundle is valid, definitely corrupt, or merely
//! inconclusive (permission, busy file, timeout).

use crate::core::error::ValidationOutcome;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

const CORRUPTION_INDICATORS: &[&str] = &[
    "unexpected eof",
    "truncated",
    "corrupted",
    "invalid tar",
    "not in gzip format",
    "invalid compressed data",
    "crc error",
    "length error",
];

/// Validate a bundle by listing its contents with `tar tf`, bounded by
/// `timeout`. Never panics; any subprocess-level failure is surfaced as
/// [`ValidationOutcome::Inconclusive`] so the caller retries later.
pub fn validate_tbz_file(path: &std::path::Path, timeout: Duration) -> ValidationOutcome {
    let mut child = match spawn_in_new_group(path) {
        Ok(c) => c,
        Err(e) => return ValidationOutcome::Inconclusive(e.to_string()),
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => {
            let mut stderr = String::new();
            if let Some(mut s) = child.stderr.take() {
                let _ = s.read_to_string(&mut stderr);
            }
            classify(status.code().unwrap_or(-1), stderr.trim())
        }
        Ok(None) => {
            kill_process_group(&child);
            let _ = child.wait();
            ValidationOutcome::Inconclusive(format!(
                "timeout after {}s (killed)",
                timeout.as_secs()
            ))
        }
        Err(e) => ValidationOutcome::Inconclusive(e.to_string()),
    }
}

fn classify(exit_code: i32, stderr: &str) -> ValidationOutcome {
    if exit_code == 0 {
        return ValidationOutcome::Valid;
    }

    let error_msg = if stderr.is_empty() {
        format!("exit code {exit_code}")
    } else {
        stderr.to_string()
    };

    let lowered = error_msg.to_ascii_lowercase();
    if CORRUPTION_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
    {
        ValidationOutcome::Corrupt(error_msg)
    } else {
        ValidationOutcome::Inconclusive(error_msg)
    }
}

#[cfg(unix)]
fn spawn_in_new_group(path: &std::path::Path) -> std::io::Result<Child> {
    use std::os::unix::process::CommandExt;
    Command::new("tar")
        .arg("tf")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
}

#[cfg(not(unix))]
fn spawn_in_new_group(path: &std::path::Path) -> std::io::Result<Child> {
    Command::new("tar")
        .arg("tf")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
}

/// SIGTERM the whole process group, wait briefly, then SIGKILL if it's
/// still alive. `process_group(0)` made the child's pid its own pgid.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use rustix::process::{kill_process_group as send_to_group, Pid, Signal};
    if let Some(pid) = Pid::from_raw(child.id() as i32) {
        let _ = send_to_group(pid, Signal::Term);
        std::thread::sleep(Duration::from_millis(500));
        let _ = send_to_group(pid, Signal::Kill);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_clean_exit_as_valid() {
        assert_eq!(classify(0, ""), ValidationOutcome::Valid);
    }

    #[test]
    fn classifies_corruption_text_as_corrupt() {
        assert!(matches!(
            classify(2, "tar: Unexpected EOF in archive"),
            ValidationOutcome::Corrupt(_)
        ));
    }

    #[test]
    fn classifies_permission_error_as_inconclusive() {
        assert!(matches!(
            classify(2, "tar: cannot open: Permission denied"),
            ValidationOutcome::Inconclusive(_)
        ));
    }
}
