//! bzip2 tar ("tbz") bundle extraction.
//!
//! No subprocess spawning for extraction itself - only the validator in
//! [`crate::core::validate`] shells out, and only to prove an archive is
//! readable before the pipeline commits to it.

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tar::Archive;

/// Extract a bundle's contents into `dest_dir`, which must already be an
/// empty (or nonexistent) scratch directory - the Ingester clears it
/// between bundles.
pub fn extract_tbz(bundle_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(bundle_path)
        .with_context(|| format!("failed to open bundle: {}", bundle_path.display()))?;

    let decoder = BzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    fs::create_dir_all(dest_dir)?;

    archive
        .unpack(dest_dir)
        .with_context(|| format!("failed to extract bundle into: {}", dest_dir.display()))?;

    Ok(())
}

/// Read every inner `*_spots.txt` / `*_noise.txt` file inside a bundle
/// directly from memory, without ever touching the filesystem. Used by the
/// BatchLoader, whose inner tbz bodies come from an outer tar stream rather
/// than a path on disk.
///
/// Returns `(relative_path, contents)` pairs for every regular file under
/// `wsprdaemon/` plus `uploads_config.txt` if present.
pub fn read_tbz_members(tbz_bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let decoder = BzDecoder::new(tbz_bytes);
    let mut archive = Archive::new(decoder);
    let mut members = Vec::new();

    for entry in archive.entries().context("reading tbz member list")? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        members.push((path, buf));
    }

    Ok(members)
}
