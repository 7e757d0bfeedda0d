use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use classroom_store::banner::{BannerCache, BannerImageResolver, ThemeCatalog, BANNER_KEY};
use classroom_store::classes::DEFAULT_SEEDS;
use classroom_store::models::ClassRecord;
use classroom_store::theme;
use classroom_store::{ChangeNotifier, KeyValueStore, MemoryStore};

/// Counts calls and answers with a fixed URL (or nothing).
struct CountingResolver {
    url: Option<String>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl BannerImageResolver for CountingResolver {
    async fn resolve(&self, _class: &ClassRecord) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.url.clone()
    }
}

fn cache() -> (MemoryStore, BannerCache) {
    let mem = MemoryStore::new();
    let cache = BannerCache::new(Arc::new(mem.clone()), ChangeNotifier::new());
    (mem, cache)
}

fn class_without_cover() -> ClassRecord {
    let mut c = DEFAULT_SEEDS[0].clone();
    c.cover_image = None;
    c
}

#[tokio::test]
async fn resolved_url_is_cached() {
    let (mem, cache) = cache();
    let resolver = CountingResolver { url: Some("https://img.example/riso.jpg".into()), calls: AtomicUsize::new(0) };
    let class = class_without_cover();

    let first = cache.resolve(&class, &resolver).await;
    let second = cache.resolve(&class, &resolver).await;
    assert_eq!(first, "https://img.example/riso.jpg");
    assert_eq!(second, first);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert!(mem.get(BANNER_KEY).unwrap().contains("riso.jpg"));
}

#[tokio::test]
async fn own_cover_wins_and_is_not_cached() {
    let (_, cache) = cache();
    let resolver = CountingResolver { url: Some("https://img.example/x.jpg".into()), calls: AtomicUsize::new(0) };
    let mut class = class_without_cover();
    class.cover_image = Some("https://img.example/own.jpg".into());
    assert_eq!(cache.resolve(&class, &resolver).await, "https://img.example/own.jpg");
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    assert!(cache.all().is_empty());
}

#[tokio::test]
async fn unresolved_falls_back_to_placeholder() {
    let (_, cache) = cache();
    let resolver = CountingResolver { url: None, calls: AtomicUsize::new(0) };
    let class = class_without_cover();
    assert_eq!(cache.resolve(&class, &resolver).await, theme::placeholder_cover(&class.id));
    assert!(cache.get(&class.id).is_none());
}

#[tokio::test]
async fn theme_catalog_uses_subject_category() {
    let (_, cache) = cache();
    let mut class = class_without_cover();
    class.subject = Some("Concert band".into());
    let url = cache.resolve(&class, &ThemeCatalog).await;
    assert!(url.starts_with("https://gstatic.com/classroom/themes/"));
    assert_eq!(cache.get(&class.id), Some(url));
}

#[tokio::test]
async fn quota_failure_still_returns_url() {
    let mem = MemoryStore::with_quota(16);
    let cache = BannerCache::new(Arc::new(mem.clone()), ChangeNotifier::new());
    let resolver = CountingResolver { url: Some("https://img.example/big.jpg".into()), calls: AtomicUsize::new(0) };
    let url = cache.resolve(&class_without_cover(), &resolver).await;
    assert_eq!(url, "https://img.example/big.jpg");
    assert!(mem.get(BANNER_KEY).is_none());
}

#[test]
fn mark_failed_replaces_with_placeholder() {
    let (_, cache) = cache();
    cache.set("riso-2", "https://broken.example/404.jpg").unwrap();
    let fallback = cache.mark_failed("riso-2").unwrap();
    assert_eq!(fallback, theme::placeholder_cover("riso-2"));
    assert_eq!(cache.get("riso-2"), Some(fallback));
    assert!(cache.remove("riso-2").unwrap());
    assert!(!cache.remove("riso-2").unwrap());
}

#[test]
fn malformed_map_reads_as_empty() {
    let (mem, cache) = cache();
    mem.set(BANNER_KEY, "[\"not\", \"a map\"]").unwrap();
    assert!(cache.all().is_empty());
    cache.set("a", "u").unwrap();
    assert_eq!(cache.all().len(), 1);
}
