use chrono::Utc;
use tracing::{debug, warn};

use crate::codec::{self, decode_or_default};
use crate::error::StoreResult;
use crate::ids::{self, normalized_class_id};
use crate::models::{Announcement, Comment};
use crate::notify::ChangeNotifier;
use crate::storage::SharedStore;

/// Flat layout: every announcement of every class in one JSON array.
pub const ANNOUNCEMENTS_KEY: &str = "classroom_announcements";
/// Partitioned layout: `announcement:<classId>:<announcementId>`.
pub const PARTITION_PREFIX: &str = "announcement:";

pub fn partition_key(class_id: &str, id: &str) -> String {
    format!("{PARTITION_PREFIX}{class_id}:{id}")
}

/// Newest first; equal timestamps keep their stored order.
pub fn sort_newest_first(list: &mut [Announcement]) {
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Announcements belonging to `class_id`: exact matches, or if there are
/// none, matches ignoring case and punctuation. Never falls back to
/// unrelated classes.
pub fn select_for_class(all: Vec<Announcement>, class_id: &str) -> Vec<Announcement> {
    let (exact, rest): (Vec<_>, Vec<_>) = all.into_iter().partition(|a| a.class_id == class_id);
    let mut selected = if !exact.is_empty() {
        debug!(class_id, matched = exact.len(), "announcements matched exactly");
        exact
    } else {
        let wanted = normalized_class_id(class_id);
        if wanted.is_empty() {
            Vec::new()
        } else {
            let loose: Vec<_> = rest
                .into_iter()
                .filter(|a| normalized_class_id(&a.class_id) == wanted)
                .collect();
            if !loose.is_empty() {
                warn!(class_id, matched = loose.len(), "announcements matched only after id normalisation");
            }
            loose
        }
    };
    sort_newest_first(&mut selected);
    selected
}

pub trait AnnouncementStore: Send + Sync {
    fn list_all(&self) -> Vec<Announcement>;
    fn list_by_class(&self, class_id: &str) -> Vec<Announcement>;
    fn get(&self, id: &str) -> Option<Announcement>;
    /// Stores the announcement under the caller's `classId`, unchanged, and
    /// returns it. An existing record with the same id is replaced.
    fn create(&self, announcement: Announcement) -> StoreResult<Announcement>;
    /// Replaces the announcement with the same id. `Ok(false)` if absent.
    fn update(&self, announcement: Announcement) -> StoreResult<bool>;
    fn delete(&self, id: &str) -> StoreResult<bool>;
    fn add_comment(&self, announcement_id: &str, comment: Comment) -> StoreResult<bool>;
    fn update_comment(&self, announcement_id: &str, comment_id: &str, content: &str) -> StoreResult<bool>;
    fn remove_comment(&self, announcement_id: &str, comment_id: &str) -> StoreResult<bool>;
    fn clear(&self) -> StoreResult<()>;

    /// Copies an announcement into another class as a fresh post without
    /// its comments.
    fn repost(&self, id: &str, target_class_id: &str) -> StoreResult<Option<Announcement>> {
        let Some(source) = self.get(id) else {
            return Ok(None);
        };
        let copy = Announcement {
            id: ids::new_record_id(),
            class_id: target_class_id.to_string(),
            created_at: Utc::now(),
            updated_at: None,
            comments: Vec::new(),
            ..source
        };
        self.create(copy).map(Some)
    }
}

fn edit_comment(a: &mut Announcement, comment_id: &str, content: &str) -> bool {
    match a.comments.iter_mut().find(|c| c.id == comment_id) {
        Some(c) => {
            c.content = content.to_string();
            c.updated_at = Some(Utc::now());
            true
        }
        None => false,
    }
}

fn drop_comment(a: &mut Announcement, comment_id: &str) -> bool {
    let before = a.comments.len();
    a.comments.retain(|c| c.id != comment_id);
    a.comments.len() != before
}

// ---------------- Flat collection ----------------

/// All announcements in one array under [`ANNOUNCEMENTS_KEY`].
///
/// Every mutation re-reads and rewrites the whole array, so two handles
/// writing at the same time can silently drop one another's change.
#[derive(Clone)]
pub struct FlatAnnouncementStore {
    store: SharedStore,
    notifier: ChangeNotifier,
}

impl FlatAnnouncementStore {
    pub fn new(store: SharedStore, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    fn load(&self) -> Vec<Announcement> {
        decode_or_default(self.store.get(ANNOUNCEMENTS_KEY).as_deref())
    }

    fn save(&self, list: &[Announcement]) -> StoreResult<()> {
        self.store.set(ANNOUNCEMENTS_KEY, &codec::encode(list)?)?;
        self.notifier.notify_announcements_changed();
        Ok(())
    }

    /// Read-modify-write of the whole collection; saves only if `f` reports
    /// a change.
    fn modify<F>(&self, f: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Vec<Announcement>) -> bool,
    {
        let mut list = self.load();
        if !f(&mut list) {
            return Ok(false);
        }
        self.save(&list)?;
        Ok(true)
    }

    fn modify_one<F>(&self, id: &str, f: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Announcement) -> bool,
    {
        self.modify(|list| list.iter_mut().find(|a| a.id == id).map_or(false, f))
    }
}

impl AnnouncementStore for FlatAnnouncementStore {
    fn list_all(&self) -> Vec<Announcement> {
        self.load()
    }

    fn list_by_class(&self, class_id: &str) -> Vec<Announcement> {
        select_for_class(self.load(), class_id)
    }

    fn get(&self, id: &str) -> Option<Announcement> {
        self.load().into_iter().find(|a| a.id == id)
    }

    fn create(&self, announcement: Announcement) -> StoreResult<Announcement> {
        let stored = announcement.clone();
        self.modify(|list| {
            match list.iter_mut().find(|a| a.id == announcement.id) {
                Some(slot) => *slot = announcement,
                None => list.push(announcement),
            }
            true
        })?;
        Ok(stored)
    }

    fn update(&self, announcement: Announcement) -> StoreResult<bool> {
        self.modify(|list| match list.iter_mut().find(|a| a.id == announcement.id) {
            Some(slot) => {
                *slot = announcement;
                true
            }
            None => false,
        })
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        self.modify(|list| {
            let before = list.len();
            list.retain(|a| a.id != id);
            list.len() != before
        })
    }

    fn add_comment(&self, announcement_id: &str, comment: Comment) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| {
            a.comments.push(comment);
            true
        })
    }

    fn update_comment(&self, announcement_id: &str, comment_id: &str, content: &str) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| edit_comment(a, comment_id, content))
    }

    fn remove_comment(&self, announcement_id: &str, comment_id: &str) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| drop_comment(a, comment_id))
    }

    fn clear(&self) -> StoreResult<()> {
        self.store.remove(ANNOUNCEMENTS_KEY)?;
        self.notifier.notify_announcements_changed();
        Ok(())
    }
}

// ---------------- Partitioned records ----------------

/// One key per announcement, indexed by class through the key prefix.
/// Writers touch only the record they change, so concurrent creates from
/// different handles do not overwrite each other.
#[derive(Clone)]
pub struct PartitionedAnnouncementStore {
    store: SharedStore,
    notifier: ChangeNotifier,
}

impl PartitionedAnnouncementStore {
    pub fn new(store: SharedStore, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    fn load_key(&self, key: &str) -> Option<Announcement> {
        let record: Option<Announcement> = codec::decode(self.store.get(key).as_deref(), None);
        record.filter(|a| partition_key(&a.class_id, &a.id) == key)
    }

    fn load_prefix(&self, prefix: &str) -> Vec<Announcement> {
        self.store
            .list_keys(Some(prefix))
            .iter()
            .filter_map(|k| self.load_key(k))
            .collect()
    }

    fn find_key(&self, id: &str) -> Option<String> {
        let suffix = format!(":{id}");
        self.store
            .list_keys(Some(PARTITION_PREFIX))
            .into_iter()
            .find(|k| k.ends_with(&suffix) && self.load_key(k).is_some_and(|a| a.id == id))
    }

    fn write(&self, announcement: &Announcement) -> StoreResult<()> {
        let key = partition_key(&announcement.class_id, &announcement.id);
        self.store.set(&key, &codec::encode(announcement)?)
    }

    fn modify_one<F>(&self, id: &str, f: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Announcement) -> bool,
    {
        let Some(key) = self.find_key(id) else {
            return Ok(false);
        };
        let Some(mut announcement) = self.load_key(&key) else {
            return Ok(false);
        };
        if !f(&mut announcement) {
            return Ok(false);
        }
        self.write(&announcement)?;
        self.notifier.notify_announcements_changed();
        Ok(true)
    }
}

impl AnnouncementStore for PartitionedAnnouncementStore {
    /// Oldest first.
    fn list_all(&self) -> Vec<Announcement> {
        let mut all = self.load_prefix(PARTITION_PREFIX);
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    fn list_by_class(&self, class_id: &str) -> Vec<Announcement> {
        let mut exact = self.load_prefix(&format!("{PARTITION_PREFIX}{class_id}:"));
        exact.retain(|a| a.class_id == class_id);
        if !exact.is_empty() {
            sort_newest_first(&mut exact);
            return exact;
        }
        select_for_class(self.list_all(), class_id)
    }

    fn get(&self, id: &str) -> Option<Announcement> {
        self.find_key(id).and_then(|k| self.load_key(&k))
    }

    fn create(&self, announcement: Announcement) -> StoreResult<Announcement> {
        let previous = self.find_key(&announcement.id);
        self.write(&announcement)?;
        let key = partition_key(&announcement.class_id, &announcement.id);
        if let Some(old) = previous.filter(|k| *k != key) {
            self.store.remove(&old)?;
        }
        self.notifier.notify_announcements_changed();
        Ok(announcement)
    }

    fn update(&self, announcement: Announcement) -> StoreResult<bool> {
        let Some(old_key) = self.find_key(&announcement.id) else {
            return Ok(false);
        };
        self.write(&announcement)?;
        if old_key != partition_key(&announcement.class_id, &announcement.id) {
            self.store.remove(&old_key)?;
        }
        self.notifier.notify_announcements_changed();
        Ok(true)
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(key) = self.find_key(id) else {
            return Ok(false);
        };
        self.store.remove(&key)?;
        self.notifier.notify_announcements_changed();
        Ok(true)
    }

    fn add_comment(&self, announcement_id: &str, comment: Comment) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| {
            a.comments.push(comment);
            true
        })
    }

    fn update_comment(&self, announcement_id: &str, comment_id: &str, content: &str) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| edit_comment(a, comment_id, content))
    }

    fn remove_comment(&self, announcement_id: &str, comment_id: &str) -> StoreResult<bool> {
        self.modify_one(announcement_id, |a| drop_comment(a, comment_id))
    }

    fn clear(&self) -> StoreResult<()> {
        for key in self.store.list_keys(Some(PARTITION_PREFIX)) {
            self.store.remove(&key)?;
        }
        self.notifier.notify_announcements_changed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ann(id: &str, class_id: &str, minute: u32) -> Announcement {
        Announcement {
            id: id.into(),
            class_id: class_id.into(),
            content: format!("post {id}"),
            author_id: "u1".into(),
            author_name: "You".into(),
            author_avatar: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
            updated_at: None,
            attachments: Vec::new(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn exact_match_wins_over_normalized() {
        let all = vec![ann("1", "riso-2", 0), ann("2", "Riso_2", 1), ann("3", "math", 2)];
        let got = select_for_class(all, "riso-2");
        assert_eq!(got.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn normalized_match_when_no_exact() {
        let all = vec![ann("1", "RISO_2", 0), ann("2", "riso 2", 5), ann("3", "math", 2)];
        let got = select_for_class(all, "riso-2");
        assert_eq!(got.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["2", "1"]);
    }

    #[test]
    fn no_match_is_empty_not_everything() {
        let all = vec![ann("1", "math", 0), ann("2", "art", 1)];
        assert!(select_for_class(all.clone(), "riso-2").is_empty());
        assert!(select_for_class(all, "--").is_empty());
    }

    #[test]
    fn ties_keep_stored_order() {
        let all = vec![ann("a", "c", 3), ann("b", "c", 3), ann("z", "c", 9)];
        let got = select_for_class(all, "c");
        assert_eq!(got.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["z", "a", "b"]);
    }

    #[test]
    fn partition_keys() {
        assert_eq!(partition_key("riso-2", "abc"), "announcement:riso-2:abc");
    }
}
