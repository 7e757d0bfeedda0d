use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use std::sync::Mutex;

use classroom_store::announcements::AnnouncementStore;
use classroom_store::config::AnnouncementLayout;
use classroom_store::models::{Announcement, NewAnnouncement};
use classroom_store::notify::poll_every;
use classroom_store::{ChangeNotifier, Classroom, FlatAnnouncementStore, MemoryStore};

#[tokio::test]
async fn poller_stops_when_dropped() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let t = ticks.clone();
    let handle = poll_every(Duration::from_millis(10), move || {
        t.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 2);

    drop(handle);
    tokio::task::yield_now().await;
    let after_drop = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
}

#[tokio::test]
async fn poller_picks_up_writes_from_elsewhere() {
    let mem = MemoryStore::new();
    let store = FlatAnnouncementStore::new(Arc::new(mem.clone()), ChangeNotifier::new());
    let writer = FlatAnnouncementStore::new(Arc::new(mem.open_tab()), ChangeNotifier::new());

    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let handle = poll_every(Duration::from_millis(10), move || {
        s.store(store.list_by_class("riso-2").len(), Ordering::SeqCst);
    });

    writer
        .create(Announcement::from_new(NewAnnouncement {
            class_id: "riso-2".into(),
            content: "Welcome".into(),
            author_id: "u".into(),
            author_name: "U".into(),
            ..Default::default()
        }))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    handle.cancel();
}

#[tokio::test]
async fn classroom_polls_class_feed_at_its_interval() {
    let mem = MemoryStore::new();
    let mut room = Classroom::with_storage(Arc::new(mem.clone()), AnnouncementLayout::Partitioned);
    room.poll_interval = Duration::from_millis(10);
    let other_tab = Classroom::with_storage(Arc::new(mem.open_tab()), AnnouncementLayout::Partitioned);

    let feeds = Arc::new(Mutex::new(Vec::new()));
    let f = feeds.clone();
    let handle = room.poll_announcements("riso-2", move |list| {
        f.lock().unwrap().push(list.len());
    });

    tokio::time::sleep(Duration::from_millis(25)).await;
    other_tab
        .announcements
        .create(Announcement::from_new(NewAnnouncement {
            class_id: "riso-2".into(),
            content: "Welcome".into(),
            author_id: "u".into(),
            author_name: "U".into(),
            ..Default::default()
        }))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    drop(handle);

    let feeds = feeds.lock().unwrap().clone();
    assert!(feeds.len() >= 3);
    assert_eq!(feeds[0], 0);
    assert_eq!(feeds.last(), Some(&1));
}
