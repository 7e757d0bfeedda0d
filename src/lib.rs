pub mod announcements;
pub mod banner;
pub mod classes;
pub mod classroom;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod notify;
pub mod storage;
pub mod theme;

// Re-export commonly used items for tests / external users
pub use announcements::{AnnouncementStore, FlatAnnouncementStore, PartitionedAnnouncementStore};
pub use classes::ClassRecordStore;
pub use classroom::Classroom;
pub use error::{StoreError, StoreResult};
pub use notify::{ChangeNotifier, Topic};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
