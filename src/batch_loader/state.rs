//! JSON checkpoint file (§4.3 BatchLoader variant, point 3): which outer
//! tars are fully done, plus running totals, so a backfill run can resume.

use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BatchLoaderState {
    pub completed_outer_tars: HashSet<String>,
    pub total_spots: u64,
    pub total_noise: u64,
    pub total_inner_bundles: u64,
}

impl BatchLoaderState {
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn reset(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_outer_tar_complete(&self, pathname: &str) -> bool {
        self.completed_outer_tars.contains(pathname)
    }

    pub fn mark_outer_tar_complete(&mut self, pathname: &str) {
        self.completed_outer_tars.insert(pathname.to_string());
    }
}

#[must_use]
pub fn default_state_path() -> PathBuf {
    PathBuf::from("batch_loader_state.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_state_file_loads_default() {
        let dir = tempdir().unwrap();
        let state = BatchLoaderState::load(&dir.path().join("state.json")).unwrap();
        assert!(state.completed_outer_tars.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = BatchLoaderState::default();
        state.mark_outer_tar_complete("archive-2019.tar");
        state.total_spots = 42;
        state.save(&path).unwrap();

        let loaded = BatchLoaderState::load(&path).unwrap();
        assert!(loaded.is_outer_tar_complete("archive-2019.tar"));
        assert_eq!(loaded.total_spots, 42);
    }

    #[test]
    fn reset_removes_state_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        BatchLoaderState::default().save(&path).unwrap();
        BatchLoaderState::reset(&path).unwrap();
        assert!(!path.exists());
    }
}
