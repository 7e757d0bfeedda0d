use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use log::{error, info, warn};

use crate::error::{StoreError, StoreResult};

/// Browser-style storage limit: 5M UTF-16 code units.
pub const DEFAULT_QUOTA_BYTES: usize = 10 * 1024 * 1024;
/// Size of the value written by [`KeyValueStore::has_quota_issue`].
pub const QUOTA_PROBE_CHARS: usize = 1024 * 1024;

const AVAILABILITY_PROBE_KEY: &str = "__test_key__";
const QUOTA_PROBE_KEY: &str = "__quota_test__";

/// Synchronous string key-value storage, modelled on the browser's local
/// storage. Every successful `set` is durable before it returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
    /// Keys in storage order, optionally restricted to a prefix.
    fn list_keys(&self, prefix: Option<&str>) -> Vec<String>;
    fn clear(&self) -> StoreResult<()>;

    /// Write/read/delete round trip. Never errors.
    fn is_available(&self) -> bool {
        if self.set(AVAILABILITY_PROBE_KEY, AVAILABILITY_PROBE_KEY).is_err() {
            return false;
        }
        let ok = self.get(AVAILABILITY_PROBE_KEY).as_deref() == Some(AVAILABILITY_PROBE_KEY);
        ok && self.remove(AVAILABILITY_PROBE_KEY).is_ok()
    }

    /// Approximate bytes used, counting keys and values as UTF-16.
    fn usage_bytes(&self) -> usize {
        self.list_keys(None)
            .into_iter()
            .map(|k| {
                let v = self.get(&k).unwrap_or_default();
                entry_bytes(&k, &v)
            })
            .sum()
    }

    /// True when a large probe value cannot be stored.
    fn has_quota_issue(&self) -> bool {
        let probe = "a".repeat(QUOTA_PROBE_CHARS);
        match self.set(QUOTA_PROBE_KEY, &probe) {
            Ok(()) => self.remove(QUOTA_PROBE_KEY).is_err(),
            Err(_) => true,
        }
    }
}

pub type SharedStore = Arc<dyn KeyValueStore>;

pub(crate) fn entry_bytes(key: &str, value: &str) -> usize {
    (key.encode_utf16().count() + value.encode_utf16().count()) * 2
}

fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    limit: usize,
) -> StoreResult<()> {
    let current: usize = entries.iter().map(|(k, v)| entry_bytes(k, v)).sum();
    let replaced = entries.get(key).map(|old| entry_bytes(key, old)).unwrap_or(0);
    let needed = current - replaced + entry_bytes(key, value);
    if needed > limit {
        warn!("quota exceeded writing '{key}': {needed} > {limit}");
        metrics::increment_counter!("classroom_store_quota_rejections_total");
        return Err(StoreError::QuotaExceeded { key: key.to_string(), needed, limit });
    }
    Ok(())
}

// ---------------- Storage-change events ----------------

/// Change observed on a shared storage area. `key` is `None` for `clear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub origin: u64,
}

pub type StorageListener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

struct Registered {
    id: u64,
    origin: u64,
    listener: StorageListener,
}

/// Unregisters its listener when dropped.
pub struct ListenerGuard {
    area: Weak<Area>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(area) = self.area.upgrade() {
            if let Ok(mut l) = area.listeners.write() {
                l.retain(|r| r.id != self.id);
            }
        }
    }
}

// ---------------- In-memory engine ----------------

struct Area {
    entries: RwLock<BTreeMap<String, String>>,
    listeners: RwLock<Vec<Registered>>,
    next_origin: AtomicU64,
    next_listener: AtomicU64,
    available: AtomicBool,
    quota: usize,
}

impl Area {
    fn dispatch(&self, event: StorageEvent) {
        let targets: Vec<StorageListener> = match self.listeners.read() {
            Ok(l) => l
                .iter()
                .filter(|r| r.origin != event.origin)
                .map(|r| r.listener.clone())
                .collect(),
            Err(_) => return,
        };
        for listener in targets {
            listener(&event);
        }
    }
}

/// Browser-like storage area. Handles created with [`MemoryStore::open_tab`]
/// share the same entries; change events reach every handle except the
/// writer, like the browser `storage` event.
#[derive(Clone)]
pub struct MemoryStore {
    area: Arc<Area>,
    origin: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota: usize) -> Self {
        let area = Arc::new(Area {
            entries: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_origin: AtomicU64::new(1),
            next_listener: AtomicU64::new(1),
            available: AtomicBool::new(true),
            quota,
        });
        Self { area, origin: 0 }
    }

    /// Another handle on the same storage area, as a second browser tab.
    pub fn open_tab(&self) -> Self {
        let origin = self.area.next_origin.fetch_add(1, Ordering::Relaxed);
        Self { area: self.area.clone(), origin }
    }

    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Simulates storage being disabled (private browsing, blocked cookies).
    pub fn set_available(&self, available: bool) {
        self.area.available.store(available, Ordering::Relaxed);
    }

    pub fn quota(&self) -> usize {
        self.area.quota
    }

    /// Registers a listener for changes made through other handles.
    pub fn on_storage_change(&self, listener: StorageListener) -> ListenerGuard {
        let id = self.area.next_listener.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut l) = self.area.listeners.write() {
            l.push(Registered { id, origin: self.origin, listener });
        }
        ListenerGuard { area: Arc::downgrade(&self.area), id }
    }

    fn enabled(&self) -> bool {
        self.area.available.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        if !self.enabled() {
            return None;
        }
        self.area.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if !self.enabled() {
            return Err(StoreError::NotAvailable);
        }
        let old_value = {
            let mut entries = self.area.entries.write().map_err(|_| StoreError::NotAvailable)?;
            check_quota(&entries, key, value, self.area.quota)?;
            entries.insert(key.to_string(), value.to_string())
        };
        metrics::increment_counter!("classroom_store_writes_total");
        self.area.dispatch(StorageEvent {
            key: Some(key.to_string()),
            old_value,
            new_value: Some(value.to_string()),
            origin: self.origin,
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        if !self.enabled() {
            return Err(StoreError::NotAvailable);
        }
        let old_value = self
            .area
            .entries
            .write()
            .map_err(|_| StoreError::NotAvailable)?
            .remove(key);
        if old_value.is_some() {
            self.area.dispatch(StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: None,
                origin: self.origin,
            });
        }
        Ok(())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Vec<String> {
        if !self.enabled() {
            return Vec::new();
        }
        match self.area.entries.read() {
            Ok(entries) => entries
                .keys()
                .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        if !self.enabled() {
            return Err(StoreError::NotAvailable);
        }
        self.area.entries.write().map_err(|_| StoreError::NotAvailable)?.clear();
        self.area.dispatch(StorageEvent { key: None, old_value: None, new_value: None, origin: self.origin });
        Ok(())
    }
}

// ---------------- File engine ----------------

/// Storage persisted as one JSON snapshot file, rewritten on every mutation.
pub struct FileStore {
    entries: RwLock<BTreeMap<String, String>>,
    snapshot_path: PathBuf,
    quota: usize,
}

impl FileStore {
    pub fn open(snapshot_path: impl Into<PathBuf>, quota: usize) -> Self {
        let snapshot_path = snapshot_path.into();
        let entries = Self::load_state_from(&snapshot_path);
        Self { entries: RwLock::new(entries), snapshot_path, quota }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    fn load_state_from(path: &Path) -> BTreeMap<String, String> {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(s) => {
                    info!("loaded storage snapshot '{}' ({} keys)", path.display(), s.len());
                    s
                }
                Err(e) => {
                    warn!("failed to parse storage snapshot '{}': {e}. Starting empty.", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) => {
                info!("no storage snapshot at '{}': {e}. Starting empty.", path.display());
                BTreeMap::new()
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        if let Some(dir) = self.snapshot_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(&self.snapshot_path, bytes).map_err(|e| {
            error!("failed to write storage snapshot '{}': {e}", self.snapshot_path.display());
            StoreError::from(e)
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::NotAvailable)?;
        check_quota(&entries, key, value, self.quota)?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            // keep memory and disk in step
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        metrics::increment_counter!("classroom_store_writes_total");
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::NotAvailable)?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries
                .keys()
                .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::NotAvailable)?;
        self.persist(&BTreeMap::new())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn prefix_listing_and_usage() {
        let s = MemoryStore::new();
        s.set("classData-a", "{}").unwrap();
        s.set("classData-b", "{}").unwrap();
        s.set("bannerImages", "{}").unwrap();
        assert_eq!(s.list_keys(Some("classData-")), vec!["classData-a", "classData-b"]);
        assert_eq!(s.list_keys(None).len(), 3);
        assert_eq!(s.usage_bytes(), (11 + 2) * 2 * 2 + (12 + 2) * 2);
    }

    #[test]
    fn quota_rejects_and_keeps_previous_value() {
        let s = MemoryStore::with_quota(40);
        s.set("k", "small").unwrap();
        let err = s.set("k", &"x".repeat(50)).unwrap_err();
        assert!(err.is_quota());
        assert_eq!(s.get("k").as_deref(), Some("small"));
        assert!(s.has_quota_issue());
    }

    #[test]
    fn disabled_storage_is_not_available() {
        let s = MemoryStore::new();
        assert!(s.is_available());
        s.set_available(false);
        assert!(!s.is_available());
        assert_eq!(s.set("k", "v"), Err(StoreError::NotAvailable));
        assert!(s.get("k").is_none());
    }

    #[test]
    fn events_skip_the_writing_tab() {
        let tab_a = MemoryStore::new();
        let tab_b = tab_a.open_tab();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let sa = seen_a.clone();
        let sb = seen_b.clone();
        let _ga = tab_a.on_storage_change(Arc::new(move |e| sa.lock().unwrap().push(e.key.clone())));
        let gb = tab_b.on_storage_change(Arc::new(move |e| sb.lock().unwrap().push(e.key.clone())));

        tab_a.set("x", "1").unwrap();
        assert!(seen_a.lock().unwrap().is_empty());
        assert_eq!(*seen_b.lock().unwrap(), vec![Some("x".to_string())]);
        assert_eq!(tab_b.get("x").as_deref(), Some("1"));

        drop(gb);
        tab_a.set("x", "2").unwrap();
        assert_eq!(seen_b.lock().unwrap().len(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        {
            let s = FileStore::open(&path, DEFAULT_QUOTA_BYTES);
            s.set("a", "1").unwrap();
            s.set("b", "2").unwrap();
            s.remove("a").unwrap();
        }
        let s = FileStore::open(&path, DEFAULT_QUOTA_BYTES);
        assert_eq!(s.get("b").as_deref(), Some("2"));
        assert!(s.get("a").is_none());
    }

    #[test]
    fn failed_persist_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let s = FileStore::open(&path, DEFAULT_QUOTA_BYTES);
        s.set("a", "1").unwrap();
        s.set("b", "2").unwrap();

        // a directory where the snapshot file should be makes every write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(s.remove("a"), Err(StoreError::Io(_))));
        assert_eq!(s.get("a").as_deref(), Some("1"));
        assert!(matches!(s.clear(), Err(StoreError::Io(_))));
        assert_eq!(s.list_keys(None), vec!["a", "b"]);
        assert!(matches!(s.set("c", "3"), Err(StoreError::Io(_))));
        assert!(s.get("c").is_none());
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"{not json").unwrap();
        let s = FileStore::open(&path, DEFAULT_QUOTA_BYTES);
        assert!(s.list_keys(None).is_empty());
        assert!(s.is_available());
    }
}
