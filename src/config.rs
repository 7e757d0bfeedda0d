use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::storage::{FileStore, MemoryStore, SharedStore, DEFAULT_QUOTA_BYTES};

const SNAPSHOT_FILE: &str = "storage.json";

/// Log filter from `RUST_LOG`, or `default` when it is unset or invalid.
pub fn log_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnouncementLayout {
    Flat,
    Partitioned,
}

/// Store settings, read from `CLASSROOM_*` environment variables.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub quota_bytes: usize,
    pub poll_interval: Duration,
    pub announcement_layout: AnnouncementLayout,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            data_dir: PathBuf::from("data"),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            poll_interval: Duration::from_millis(3000),
            announcement_layout: AnnouncementLayout::Flat,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn millis_env(name: &str, default: u64) -> Duration {
            Duration::from_millis(std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default))
        }
        let d = Self::default();

        let backend = match std::env::var("CLASSROOM_BACKEND").as_deref() {
            Ok("memory") => Backend::Memory,
            Ok("file") | Err(_) => Backend::File,
            Ok(other) => {
                warn!("unknown CLASSROOM_BACKEND '{other}', using file");
                Backend::File
            }
        };
        let announcement_layout = match std::env::var("CLASSROOM_ANNOUNCEMENT_LAYOUT").as_deref() {
            Ok("partitioned") => AnnouncementLayout::Partitioned,
            Ok("flat") | Err(_) => AnnouncementLayout::Flat,
            Ok(other) => {
                warn!("unknown CLASSROOM_ANNOUNCEMENT_LAYOUT '{other}', using flat");
                AnnouncementLayout::Flat
            }
        };

        Self {
            backend,
            data_dir: std::env::var("CLASSROOM_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            quota_bytes: usize_env("CLASSROOM_QUOTA_BYTES", d.quota_bytes),
            poll_interval: millis_env("CLASSROOM_POLL_MS", d.poll_interval.as_millis() as u64),
            announcement_layout,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn open_storage(&self) -> SharedStore {
        match self.backend {
            Backend::Memory => Arc::new(MemoryStore::with_quota(self.quota_bytes)),
            Backend::File => Arc::new(FileStore::open(self.snapshot_path(), self.quota_bytes)),
        }
    }
}
