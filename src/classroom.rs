use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::announcements::{AnnouncementStore, FlatAnnouncementStore, PartitionedAnnouncementStore};
use crate::banner::BannerCache;
use crate::classes::ClassRecordStore;
use crate::config::{AnnouncementLayout, StoreConfig};
use crate::models::Announcement;
use crate::notify::{self, ChangeNotifier, PollHandle};
use crate::storage::SharedStore;

/// Every store of one client session wired to a shared storage and notifier.
#[derive(Clone)]
pub struct Classroom {
    pub storage: SharedStore,
    pub notifier: ChangeNotifier,
    pub classes: ClassRecordStore,
    pub announcements: Arc<dyn AnnouncementStore>,
    pub banners: BannerCache,
    /// Period used by [`Classroom::poll_announcements`].
    pub poll_interval: Duration,
}

impl Classroom {
    pub fn open(config: &StoreConfig) -> Self {
        let storage = config.open_storage();
        if !storage.is_available() {
            warn!("storage is not available; writes will fail");
        }
        info!(backend = ?config.backend, layout = ?config.announcement_layout, "classroom store opened");
        Self {
            poll_interval: config.poll_interval,
            ..Self::with_storage(storage, config.announcement_layout)
        }
    }

    pub fn with_storage(storage: SharedStore, layout: AnnouncementLayout) -> Self {
        let notifier = ChangeNotifier::new();
        let announcements: Arc<dyn AnnouncementStore> = match layout {
            AnnouncementLayout::Flat => Arc::new(FlatAnnouncementStore::new(storage.clone(), notifier.clone())),
            AnnouncementLayout::Partitioned => {
                Arc::new(PartitionedAnnouncementStore::new(storage.clone(), notifier.clone()))
            }
        };
        Self {
            classes: ClassRecordStore::new(storage.clone(), notifier.clone()),
            banners: BannerCache::new(storage.clone(), notifier.clone()),
            announcements,
            notifier,
            storage,
            poll_interval: StoreConfig::default().poll_interval,
        }
    }

    /// Re-reads the class feed every `poll_interval` and hands it to `f`,
    /// picking up posts written through other handles. Stops when the
    /// returned handle is dropped. Must be called inside a tokio runtime.
    pub fn poll_announcements<F>(&self, class_id: &str, mut f: F) -> PollHandle
    where
        F: FnMut(Vec<Announcement>) + Send + 'static,
    {
        let announcements = self.announcements.clone();
        let class_id = class_id.to_string();
        notify::poll_every(self.poll_interval, move || f(announcements.list_by_class(&class_id)))
    }
}
