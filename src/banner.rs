use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::codec::{self, decode_or_default};
use crate::error::StoreResult;
use crate::models::ClassRecord;
use crate::notify::ChangeNotifier;
use crate::storage::SharedStore;
use crate::theme;

/// JSON map of class id to resolved banner URL.
pub const BANNER_KEY: &str = "bannerImages";

/// Source of banner images for classes without a cover of their own.
#[async_trait]
pub trait BannerImageResolver: Send + Sync {
    async fn resolve(&self, class: &ClassRecord) -> Option<String>;
}

/// Picks a theme image by guessing the class category from its subject
/// (or name). The choice within a category is stable per class id.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThemeCatalog;

#[async_trait]
impl BannerImageResolver for ThemeCatalog {
    async fn resolve(&self, class: &ClassRecord) -> Option<String> {
        let hint = class
            .subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| class.display_name());
        let category = theme::category_for(&hint);
        Some(theme::theme_image_url(category, &class.id))
    }
}

/// Persisted cache of resolved banner URLs. Stores whatever URL it is given;
/// reachability is the caller's concern (see [`BannerCache::mark_failed`]).
#[derive(Clone)]
pub struct BannerCache {
    store: SharedStore,
    notifier: ChangeNotifier,
}

impl BannerCache {
    pub fn new(store: SharedStore, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    pub fn all(&self) -> BTreeMap<String, String> {
        decode_or_default(self.store.get(BANNER_KEY).as_deref())
    }

    fn save(&self, map: &BTreeMap<String, String>) -> StoreResult<()> {
        self.store.set(BANNER_KEY, &codec::encode(map)?)?;
        self.notifier.notify_banners_changed();
        Ok(())
    }

    pub fn get(&self, class_id: &str) -> Option<String> {
        self.all().remove(class_id)
    }

    pub fn set(&self, class_id: &str, url: &str) -> StoreResult<()> {
        let mut map = self.all();
        map.insert(class_id.to_string(), url.to_string());
        self.save(&map)
    }

    pub fn remove(&self, class_id: &str) -> StoreResult<bool> {
        let mut map = self.all();
        if map.remove(class_id).is_none() {
            return Ok(false);
        }
        self.save(&map)?;
        Ok(true)
    }

    /// Banner for `class`: its own cover image, else the cached URL, else a
    /// freshly resolved one (cached), else the placeholder.
    ///
    /// A failed cache write is logged; the resolved URL is still returned.
    pub async fn resolve<R>(&self, class: &ClassRecord, resolver: &R) -> String
    where
        R: BannerImageResolver + ?Sized,
    {
        if let Some(own) = class.cover_image.as_deref().filter(|s| !s.trim().is_empty()) {
            return own.to_string();
        }
        if let Some(cached) = self.get(&class.id) {
            debug!(class_id = %class.id, "banner cache hit");
            return cached;
        }
        match resolver.resolve(class).await {
            Some(url) => {
                if let Err(e) = self.set(&class.id, &url) {
                    warn!(class_id = %class.id, "could not cache banner: {e}");
                }
                url
            }
            None => theme::placeholder_cover(&class.id),
        }
    }

    /// Caller reports the cached image failed to load; replace it with the
    /// placeholder and return that.
    pub fn mark_failed(&self, class_id: &str) -> StoreResult<String> {
        let fallback = theme::placeholder_cover(class_id);
        self.set(class_id, &fallback)?;
        Ok(fallback)
    }
}
