//! End-to-end scenario from §8: fanning a validated bundle out across two
//! destinations where one is unwritable. The source must survive (never
//! deleted until every destination has it), and the healthy destination
//! must still receive its copy on the first cycle.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use wsprnet_relay::config::{Destination, ReflectorConfig};
use wsprnet_relay::reflector::queue::QueueManager;
use wsprnet_relay::reflector::scanner::Scanner;

fn make_valid_tbz(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let enc = bzip2::write::BzEncoder::new(file, bzip2::Compression::fast());
    let mut builder = tar::Builder::new(enc);
    let mut header = tar::Header::new_gnu();
    header.set_size(5);
    header.set_cksum();
    builder.append_data(&mut header, "hello.txt", &b"hello"[..]).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

#[test]
fn healthy_destination_gets_bundle_while_blocked_one_keeps_source_alive() {
    let upload = tempdir().unwrap();
    let queue = tempdir().unwrap();
    let bundle = upload.path().join("X.tbz");
    make_valid_tbz(&bundle);

    // Pre-create the "bad" destination's queue slot as a plain file, so
    // `fs::create_dir_all` fails for it every cycle.
    fs::write(queue.path().join("dest-bad"), b"not a directory").unwrap();

    let config = ReflectorConfig {
        incoming_pattern: upload.path().to_string_lossy().into_owned(),
        queue_base_dir: queue.path().to_path_buf(),
        destinations: vec![
            Destination {
                name: "dest-ok".to_string(),
                user: "wspr".to_string(),
                host: "localhost".to_string(),
                path: "/incoming".to_string(),
                ssh_key: None,
            },
            Destination {
                name: "dest-bad".to_string(),
                user: "wspr".to_string(),
                host: "localhost".to_string(),
                path: "/incoming".to_string(),
                ssh_key: None,
            },
        ],
        min_age_seconds: 0,
        max_files_per_scan: 100,
        tar_timeout: 5,
        ..ReflectorConfig::default()
    };

    let qm = Arc::new(QueueManager::new(queue.path().to_path_buf(), 80.0, 10));
    let mut scanner = Scanner::new(config, qm);

    let stats = scanner.run_cycle(false).unwrap();

    assert_eq!(stats.fanout_partial, 1);
    assert_eq!(stats.fanned_out, 0);
    assert!(bundle.exists(), "source must survive until every destination succeeds");
    assert!(queue.path().join("dest-ok").join("X.tbz").exists());

    // Fix the bad destination and re-scan: the healthy copy must not be
    // clobbered, and the source should finally be removed.
    fs::remove_file(queue.path().join("dest-bad")).unwrap();
    let stats2 = scanner.run_cycle(false).unwrap();

    assert_eq!(stats2.fanned_out, 1);
    assert!(!bundle.exists());
    assert!(queue.path().join("dest-bad").join("X.tbz").exists());
}
