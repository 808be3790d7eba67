//! Bundle extraction plumbing shared by the Ingester and BatchLoader:
//! reading `uploads_config.txt` and walking the extracted `wsprdaemon/`
//! tree for spot/noise files.

use crate::parsers::{band_str_to_meters, decode_rx_site_dir};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parsed `uploads_config.txt` key=value pairs of interest.
#[derive(Debug, Default, Clone)]
pub struct UploadsConfig {
    pub client_version: Option<String>,
    pub running_jobs: Option<String>,
    pub receiver_descriptions: Option<String>,
}

/// Parse `uploads_config.txt` contents. Unknown keys are ignored; quoted
/// values have their surrounding single/double quotes stripped.
#[must_use]
pub fn parse_uploads_config(content: &str) -> UploadsConfig {
    let mut map: HashMap<String, String> = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), strip_quotes(value.trim()));
    }

    UploadsConfig {
        client_version: map.remove("CLIENT_VERSION"),
        running_jobs: map.remove("RUNNING_JOBS"),
        receiver_descriptions: map.remove("RECEIVER_DESCRIPTIONS"),
    }
}

fn strip_quotes(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// One discovered spot or noise text file, with its `RX_SITE/RECEIVER/BAND`
/// path context already decoded.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub rx_sign: String,
    pub rx_loc: String,
    pub rx_id: String,
    pub band_str: String,
    pub band_m: i32,
}

/// Walk `<root>/wsprdaemon/{spots,noise}/<RX_SITE>/<RECEIVER>/<BAND>/*.txt`
/// under `extraction_dir`, decoding the directory triple for each file.
#[must_use]
pub fn discover_files(extraction_dir: &Path, kind: &str, suffix: &str) -> Vec<DiscoveredFile> {
    let root = extraction_dir.join("wsprdaemon").join(kind);
    let mut out = Vec::new();
    let Ok(rx_site_dirs) = std::fs::read_dir(&root) else {
        return out;
    };

    for rx_site_entry in rx_site_dirs.filter_map(Result::ok) {
        let rx_site_dir = rx_site_entry.path();
        if !rx_site_dir.is_dir() {
            continue;
        }
        let rx_site_name = rx_site_entry.file_name();
        let (rx_sign, rx_loc) = decode_rx_site_dir(&rx_site_name.to_string_lossy());

        let Ok(receiver_dirs) = std::fs::read_dir(&rx_site_dir) else {
            continue;
        };
        for receiver_entry in receiver_dirs.filter_map(Result::ok) {
            let receiver_dir = receiver_entry.path();
            if !receiver_dir.is_dir() {
                continue;
            }
            let rx_id = receiver_entry.file_name().to_string_lossy().into_owned();

            let Ok(band_dirs) = std::fs::read_dir(&receiver_dir) else {
                continue;
            };
            for band_entry in band_dirs.filter_map(Result::ok) {
                let band_dir = band_entry.path();
                if !band_dir.is_dir() {
                    continue;
                }
                let band_str = band_entry.file_name().to_string_lossy().into_owned();
                let Some(band_m) = band_str_to_meters(&band_str) else {
                    continue;
                };

                let Ok(files) = std::fs::read_dir(&band_dir) else {
                    continue;
                };
                for file_entry in files.filter_map(Result::ok) {
                    let path = file_entry.path();
                    if path.is_file() && path.to_string_lossy().ends_with(suffix) {
                        out.push(DiscoveredFile {
                            path,
                            rx_sign: rx_sign.clone(),
                            rx_loc: rx_loc.clone(),
                            rx_id: rx_id.clone(),
                            band_str: band_str.clone(),
                            band_m,
                        });
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_unquoted_values() {
        let content = "CLIENT_VERSION=4.1.7\nRUNNING_JOBS=\"S1,S2\"\nRECEIVER_DESCRIPTIONS='KA9Q_DXE'\n";
        let cfg = parse_uploads_config(content);
        assert_eq!(cfg.client_version.as_deref(), Some("4.1.7"));
        assert_eq!(cfg.running_jobs.as_deref(), Some("S1,S2"));
        assert_eq!(cfg.receiver_descriptions.as_deref(), Some("KA9Q_DXE"));
    }

    #[test]
    fn missing_keys_are_none() {
        let cfg = parse_uploads_config("SOMETHING_ELSE=1\n");
        assert!(cfg.client_version.is_none());
    }

    #[test]
    fn discover_files_walks_rx_site_receiver_band_tree() {
        let dir = tempfile::tempdir().unwrap();
        let leaf = dir.path().join("wsprdaemon/spots/AC0G_EN16ov/KA9Q_DXE/20");
        std::fs::create_dir_all(&leaf).unwrap();
        std::fs::write(leaf.join("230615_1200_spots.txt"), "x").unwrap();

        let found = discover_files(dir.path(), "spots", "_spots.txt");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rx_sign, "AC0G");
        assert_eq!(found[0].rx_loc, "EN16ov");
        assert_eq!(found[0].rx_id, "KA9Q_DXE");
        assert_eq!(found[0].band_m, 20);
    }
}
