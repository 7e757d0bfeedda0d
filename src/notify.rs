//! Change notification between store users.
//!
//! Signals carry no payload and may repeat; observers re-run their query on
//! every delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::announcements::{ANNOUNCEMENTS_KEY, PARTITION_PREFIX};
use crate::banner::BANNER_KEY;
use crate::classes::{ARCHIVED_KEY, CLASS_KEY_PREFIX};
use crate::storage::{ListenerGuard, MemoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Classes,
    Announcements,
    Banners,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Classes, Topic::Announcements, Topic::Banners];

    /// Topics affected by a change to `key`; `None` (storage cleared) hits all.
    pub fn for_key(key: Option<&str>) -> Vec<Topic> {
        let Some(key) = key else { return Topic::ALL.to_vec() };
        if key.starts_with(CLASS_KEY_PREFIX) || key == ARCHIVED_KEY {
            vec![Topic::Classes]
        } else if key == ANNOUNCEMENTS_KEY || key.starts_with(PARTITION_PREFIX) {
            vec![Topic::Announcements]
        } else if key == BANNER_KEY {
            vec![Topic::Banners]
        } else {
            Vec::new()
        }
    }
}

type Handler = Arc<dyn Fn(Topic) + Send + Sync>;

#[derive(Default)]
struct Inner {
    subscribers: DashMap<Topic, Vec<(u64, Handler)>>,
    next_id: AtomicU64,
}

/// Publish/subscribe hub shared by every store and observer in one tab.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

/// Keeps a handler registered; dropping it unsubscribes.
pub struct Subscription {
    inner: Weak<Inner>,
    topic: Topic,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if let Some(mut list) = inner.subscribers.get_mut(&self.topic) {
                list.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(Topic) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { inner: Arc::downgrade(&self.inner), topic, id }
    }

    pub fn notify(&self, topic: Topic) {
        Self::deliver(&self.inner, topic);
    }

    pub fn notify_classes_changed(&self) {
        self.notify(Topic::Classes);
    }

    pub fn notify_announcements_changed(&self) {
        self.notify(Topic::Announcements);
    }

    pub fn notify_banners_changed(&self) {
        self.notify(Topic::Banners);
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner.subscribers.get(&topic).map_or(0, |l| l.len())
    }

    /// Re-broadcasts changes other tabs make to `store` as local topics.
    pub fn follow_storage(&self, store: &MemoryStore) -> ListenerGuard {
        let inner = Arc::downgrade(&self.inner);
        store.on_storage_change(Arc::new(move |event| {
            let Some(inner) = inner.upgrade() else { return };
            for topic in Topic::for_key(event.key.as_deref()) {
                trace!(?topic, key = ?event.key, origin = event.origin, "storage change from another tab");
                Self::deliver(&inner, topic);
            }
        }))
    }

    fn deliver(inner: &Inner, topic: Topic) {
        // clone out so handlers may subscribe or notify re-entrantly
        let handlers: Vec<Handler> = match inner.subscribers.get(&topic) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };
        debug!(?topic, observers = handlers.len(), "notify");
        for h in handlers {
            h(topic);
        }
    }
}

/// Periodic re-query task; aborted when dropped.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(self) {}

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs `f` now and then every `period` on the current tokio runtime.
/// Must be called from within a runtime.
pub fn poll_every<F>(period: Duration, mut f: F) -> PollHandle
where
    F: FnMut() + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            f();
        }
    });
    PollHandle { handle }
}
