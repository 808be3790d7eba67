//! Local filesystem usage, used by [`crate::reflector::queue::QueueManager`]
//! to decide when to purge the largest queue.

use std::path::Path;

/// Percentage of the filesystem containing `path` currently in use, or
/// `None` if the statvfs call fails (treated as "assume OK" by callers, the
/// same conservative default the original implementation used).
#[must_use]
pub fn used_percent(path: &Path) -> Option<f64> {
    let stats = rustix::fs::statvfs(path).ok()?;
    if stats.f_blocks == 0 {
        return None;
    }
    let total = stats.f_blocks as f64;
    let free = stats.f_bavail as f64;
    Some(((total - free) / total) * 100.0)
}
