//! Processed-pathname memo (§4.3): one pathname per line, loaded once per
//! cycle rather than re-read per bundle (the prior O(n²) behavior this
//! design explicitly avoids).

use crate::core::Result;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ProcessedMemo {
    path: PathBuf,
    max_size_bytes: u64,
}

impl ProcessedMemo {
    #[must_use]
    pub fn new(path: PathBuf, max_size_bytes: u64) -> Self {
        Self { path, max_size_bytes }
    }

    /// Load the full memo into a set. Called once at the start of a cycle;
    /// callers must not re-read per bundle.
    pub fn load(&self) -> Result<HashSet<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one pathname, truncating to the newest 75% of entries first
    /// if the file has grown past `max_size_bytes`.
    pub fn append(&self, pathname: &str) -> Result<()> {
        if let Ok(meta) = fs::metadata(&self.path) {
            if meta.len() > self.max_size_bytes {
                self.truncate_to_newest_75_percent()?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{pathname}")?;
        Ok(())
    }

    fn truncate_to_newest_75_percent(&self) -> Result<()> {
        let content = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = content.lines().collect();
        let keep_from = lines.len() / 4;
        let kept = lines[keep_from..].join("\n");

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, format!("{kept}\n"))?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| ".processed.tmp".to_string(), |n| format!(".{}.tmp", n.to_string_lossy()));
        self.path.with_file_name(name)
    }
}

#[must_use]
pub fn default_memo_path(extraction_dir: &Path) -> PathBuf {
    extraction_dir.join("processed.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let memo = ProcessedMemo::new(dir.path().join("processed.txt"), 1024);
        assert!(memo.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let memo = ProcessedMemo::new(dir.path().join("processed.txt"), 1024 * 1024);
        memo.append("/incoming/a.tbz").unwrap();
        memo.append("/incoming/b.tbz").unwrap();

        let loaded = memo.load().unwrap();
        assert!(loaded.contains("/incoming/a.tbz"));
        assert!(loaded.contains("/incoming/b.tbz"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn oversized_file_keeps_newest_75_percent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");
        let memo = ProcessedMemo::new(path.clone(), 10);

        for i in 0..20 {
            memo.append(&format!("/incoming/{i}.tbz")).unwrap();
        }

        let loaded = memo.load().unwrap();
        assert!(loaded.contains("/incoming/19.tbz"));
        assert!(!loaded.contains("/incoming/0.tbz"));
    }
}
