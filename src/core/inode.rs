//! Per-file inode and age helpers used by the Scanner's validate-once cache.

use std::path::Path;
use std::time::SystemTime;

/// The file's inode number on Unix. There is no portable equivalent on
/// non-Unix platforms; callers treat `None` as "file disappeared" and skip
/// it for this cycle, same as a stat failure.
#[must_use]
pub fn file_inode(path: &Path) -> Option<u64> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        std::fs::metadata(path).ok().map(|m| m.ino())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

/// Seconds since the file's mtime, or `0.0` if it cannot be stat'd (treated
/// as "too young to touch yet" by callers).
#[must_use]
pub fn file_age_seconds(path: &Path) -> f64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(0.0, |d| d.as_secs_f64())
}
