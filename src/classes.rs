use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::codec::{self, decode_or_default};
use crate::error::StoreResult;
use crate::ids;
use crate::models::{ClassRecord, NewClass, UpdateClass};
use crate::notify::ChangeNotifier;
use crate::storage::SharedStore;
use crate::theme;

pub const CLASS_KEY_PREFIX: &str = "classData-";
pub const ARCHIVED_KEY: &str = "archivedClasses";

pub fn class_key(id: &str) -> String {
    format!("{CLASS_KEY_PREFIX}{id}")
}

fn seed(id: &str, name: &str, section: &str, subject: &str, room: &str, color: &str, code: &str) -> ClassRecord {
    ClassRecord {
        id: id.into(),
        name: Some(name.into()),
        section: Some(section.into()),
        teacher_name: Some("Classroom Admin".into()),
        subject: Some(subject.into()),
        room: Some(room.into()),
        color: Some(color.into()),
        text_color: Some(theme::DEFAULT_TEXT_COLOR.into()),
        cover_image: None,
        enrollment_code: code.into(),
        created_at: None,
    }
}

/// Built-in classes every installation starts with.
pub static DEFAULT_SEEDS: Lazy<Vec<ClassRecord>> = Lazy::new(|| {
    vec![
        seed("riso-2", "Riso", "Batch 2", "Printmaking", "Studio B", "#e37400", "r1so2bx"),
        seed("web-dev-101", "Web Development", "Section A", "Computer Science", "Lab 4", "#1a73e8", "wd101ka"),
        seed("world-history", "World History", "Period 3", "History", "Room 12", "#1e8e3e", "wh3p0rt"),
    ]
});

fn set_field(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = if v.trim().is_empty() { None } else { Some(v) };
    }
}

fn apply_update(record: &mut ClassRecord, upd: UpdateClass) {
    set_field(&mut record.name, upd.name);
    set_field(&mut record.section, upd.section);
    set_field(&mut record.teacher_name, upd.teacher_name);
    set_field(&mut record.subject, upd.subject);
    set_field(&mut record.room, upd.room);
    set_field(&mut record.color, upd.color);
    set_field(&mut record.text_color, upd.text_color);
    set_field(&mut record.cover_image, upd.cover_image);
}

/// Class records in two tiers: an immutable seed table and per-class
/// override keys (`classData-<id>`). Lookups check override, then seed.
/// Archived classes live in one array under `archivedClasses` and are
/// hidden from both tiers.
#[derive(Clone)]
pub struct ClassRecordStore {
    store: SharedStore,
    notifier: ChangeNotifier,
    seeds: Arc<Vec<ClassRecord>>,
}

impl ClassRecordStore {
    pub fn new(store: SharedStore, notifier: ChangeNotifier) -> Self {
        Self::with_seeds(store, notifier, DEFAULT_SEEDS.to_vec())
    }

    pub fn with_seeds(store: SharedStore, notifier: ChangeNotifier, seeds: Vec<ClassRecord>) -> Self {
        Self { store, notifier, seeds: Arc::new(seeds) }
    }

    pub fn seeds(&self) -> &[ClassRecord] {
        &self.seeds
    }

    fn load_override(&self, id: &str) -> Option<ClassRecord> {
        let raw = self.store.get(&class_key(id));
        let record: Option<ClassRecord> = codec::decode(raw.as_deref(), None);
        match record {
            Some(r) if r.id == id => Some(r),
            Some(r) => {
                warn!(key = %class_key(id), found = %r.id, "class record id does not match its key; ignoring");
                None
            }
            None => None,
        }
    }

    fn load_overrides(&self) -> Vec<ClassRecord> {
        self.store
            .list_keys(Some(CLASS_KEY_PREFIX))
            .iter()
            .filter_map(|k| self.load_override(&k[CLASS_KEY_PREFIX.len()..]))
            .collect()
    }

    fn archived(&self) -> Vec<ClassRecord> {
        decode_or_default(self.store.get(ARCHIVED_KEY).as_deref())
    }

    fn save_archived(&self, list: &[ClassRecord]) -> StoreResult<()> {
        self.store.set(ARCHIVED_KEY, &codec::encode(list)?)
    }

    fn persist(&self, record: &ClassRecord) -> StoreResult<()> {
        self.store.set(&class_key(&record.id), &codec::encode(record)?)
    }

    fn lookup(&self, id: &str) -> Option<ClassRecord> {
        if self.archived().iter().any(|c| c.id == id) {
            return None;
        }
        self.load_override(id)
            .or_else(|| self.seeds.iter().find(|s| s.id == id).cloned())
    }

    pub fn get_class(&self, id: &str) -> Option<ClassRecord> {
        self.lookup(id).or_else(|| {
            let canonical = ids::canonical_class_id(id);
            (canonical != id).then(|| self.lookup(&canonical)).flatten()
        })
    }

    pub fn create_class(&self, new: NewClass) -> StoreResult<ClassRecord> {
        let mut name = None;
        set_field(&mut name, Some(new.name));
        let mut id = ids::new_class_id(name.as_deref().unwrap_or_default());
        while self.get_class(&id).is_some() || self.archived().iter().any(|c| c.id == id) {
            id = ids::new_class_id(name.as_deref().unwrap_or_default());
        }
        let mut code = ids::enrollment_code();
        while self.find_by_enrollment_code(&code).is_some() {
            code = ids::enrollment_code();
        }

        let mut record = ClassRecord {
            id,
            name,
            section: None,
            teacher_name: None,
            subject: None,
            room: None,
            color: None,
            text_color: Some(theme::DEFAULT_TEXT_COLOR.into()),
            cover_image: None,
            enrollment_code: code,
            created_at: Some(Utc::now()),
        };
        set_field(&mut record.section, new.section);
        set_field(&mut record.subject, new.subject);
        set_field(&mut record.room, new.room);
        set_field(&mut record.teacher_name, new.teacher_name);
        record.color = Some(theme::default_color(&record.display_name()).into());

        self.persist(&record)?;
        info!(id = %record.id, "class created");
        self.notifier.notify_classes_changed();
        Ok(record)
    }

    /// Merges `upd` into the class. `Ok(None)` when the class does not exist
    /// or is archived. Editing a seed class stores an override.
    pub fn update_class(&self, id: &str, upd: UpdateClass) -> StoreResult<Option<ClassRecord>> {
        let Some(mut record) = self.get_class(id) else {
            return Ok(None);
        };
        apply_update(&mut record, upd);
        self.persist(&record)?;
        self.notifier.notify_classes_changed();
        Ok(Some(record))
    }

    pub fn set_theme(&self, id: &str, color: &str, cover_image: &str) -> StoreResult<Option<ClassRecord>> {
        self.update_class(
            id,
            UpdateClass {
                color: Some(color.into()),
                cover_image: Some(cover_image.into()),
                ..Default::default()
            },
        )
    }

    /// Seeds first (in seed order, overrides applied), then user-created
    /// classes oldest first. Archived classes are excluded.
    pub fn list_classes(&self) -> Vec<ClassRecord> {
        let archived: HashSet<String> = self.archived().into_iter().map(|c| c.id).collect();
        let mut overrides: HashMap<String, ClassRecord> = self
            .load_overrides()
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut out: Vec<ClassRecord> = self
            .seeds
            .iter()
            .filter(|s| !archived.contains(&s.id))
            .map(|s| overrides.remove(&s.id).unwrap_or_else(|| s.clone()))
            .collect();

        let mut rest: Vec<ClassRecord> = overrides
            .into_values()
            .filter(|c| !archived.contains(&c.id))
            .collect();
        rest.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out.extend(rest);
        out
    }

    pub fn list_archived(&self) -> Vec<ClassRecord> {
        self.archived()
    }

    /// Moves an active class into the archived collection. `Ok(false)` when
    /// there is nothing active to archive.
    pub fn archive_class(&self, id: &str) -> StoreResult<bool> {
        let Some(record) = self.get_class(id) else {
            return Ok(false);
        };
        let mut archived = self.archived();
        archived.retain(|c| c.id != record.id);
        archived.push(record.clone());
        self.save_archived(&archived)?;
        self.store.remove(&class_key(&record.id))?;
        info!(id = %record.id, "class archived");
        self.notifier.notify_classes_changed();
        Ok(true)
    }

    /// Reverse of [`archive_class`](Self::archive_class).
    pub fn restore_class(&self, id: &str) -> StoreResult<bool> {
        let mut archived = self.archived();
        let canonical = ids::canonical_class_id(id);
        let Some(pos) = archived
            .iter()
            .position(|c| c.id == id)
            .or_else(|| archived.iter().position(|c| c.id == canonical))
        else {
            return Ok(false);
        };
        let record = archived.remove(pos);
        self.persist(&record)?;
        self.save_archived(&archived)?;
        info!(id = %record.id, "class restored");
        self.notifier.notify_classes_changed();
        Ok(true)
    }

    pub fn find_by_enrollment_code(&self, code: &str) -> Option<ClassRecord> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        self.list_classes()
            .into_iter()
            .find(|c| c.enrollment_code.eq_ignore_ascii_case(code))
    }
}
