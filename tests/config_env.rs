use std::time::Duration;

use classroom_store::config::{log_filter, AnnouncementLayout, Backend, StoreConfig};
use classroom_store::models::NewClass;
use classroom_store::storage::DEFAULT_QUOTA_BYTES;
use classroom_store::Classroom;

const VARS: [&str; 5] = [
    "CLASSROOM_BACKEND",
    "CLASSROOM_DATA_DIR",
    "CLASSROOM_QUOTA_BYTES",
    "CLASSROOM_POLL_MS",
    "CLASSROOM_ANNOUNCEMENT_LAYOUT",
];

fn reset_env() {
    for v in VARS {
        std::env::remove_var(v);
    }
}

#[test]
#[serial_test::serial]
fn defaults_without_env() {
    reset_env();
    let cfg = StoreConfig::from_env();
    assert_eq!(cfg.backend, Backend::File);
    assert_eq!(cfg.quota_bytes, DEFAULT_QUOTA_BYTES);
    assert_eq!(cfg.poll_interval, Duration::from_millis(3000));
    assert_eq!(cfg.announcement_layout, AnnouncementLayout::Flat);
    assert_eq!(cfg.snapshot_path(), std::path::PathBuf::from("data").join("storage.json"));
}

#[test]
#[serial_test::serial]
fn env_overrides_and_bad_values() {
    reset_env();
    std::env::set_var("CLASSROOM_BACKEND", "memory");
    std::env::set_var("CLASSROOM_QUOTA_BYTES", "1024");
    std::env::set_var("CLASSROOM_POLL_MS", "not-a-number");
    std::env::set_var("CLASSROOM_ANNOUNCEMENT_LAYOUT", "partitioned");
    let cfg = StoreConfig::from_env();
    assert_eq!(cfg.backend, Backend::Memory);
    assert_eq!(cfg.quota_bytes, 1024);
    assert_eq!(cfg.poll_interval, Duration::from_millis(3000));
    assert_eq!(cfg.announcement_layout, AnnouncementLayout::Partitioned);

    std::env::set_var("CLASSROOM_BACKEND", "cloud");
    assert_eq!(StoreConfig::from_env().backend, Backend::File);
    reset_env();
}

#[test]
#[serial_test::serial]
fn file_backend_persists_across_sessions() {
    reset_env();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("CLASSROOM_DATA_DIR", dir.path());
    let cfg = StoreConfig::from_env();

    let created = {
        let room = Classroom::open(&cfg);
        room.classes.create_class(NewClass { name: "Riso".into(), ..Default::default() }).unwrap()
    };
    let room = Classroom::open(&cfg);
    assert_eq!(room.classes.get_class(&created.id), Some(created));
    assert!(cfg.snapshot_path().exists());
    reset_env();
}

#[test]
#[serial_test::serial]
fn classroom_takes_poll_interval_from_env() {
    reset_env();
    std::env::set_var("CLASSROOM_BACKEND", "memory");
    std::env::set_var("CLASSROOM_POLL_MS", "250");
    let room = Classroom::open(&StoreConfig::from_env());
    assert_eq!(room.poll_interval, Duration::from_millis(250));
    reset_env();
}

#[test]
#[serial_test::serial]
fn log_filter_prefers_rust_log() {
    std::env::remove_var("RUST_LOG");
    assert_eq!(log_filter("warn").to_string(), "warn");
    std::env::set_var("RUST_LOG", "debug");
    assert_eq!(log_filter("warn").to_string(), "debug");
    std::env::remove_var("RUST_LOG");
}
