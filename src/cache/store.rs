//! Cache backends.

use std::sync::{Arc, RwLock};

use lru::LruCache;
use metrics::counter;

use crate::domain::article::Article;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A value produced by one of the cached lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Names(Vec<String>),
    Article(Option<Arc<Article>>),
}

/// Conversion between lookup results and [`CachedValue`].
pub trait Cacheable: Sized {
    fn into_cached(self) -> CachedValue;

    /// `None` when the cached value has a different shape.
    fn from_cached(value: CachedValue) -> Option<Self>;
}

impl Cacheable for Vec<String> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Names(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Names(names) => Some(names),
            CachedValue::Article(_) => None,
        }
    }
}

impl Cacheable for Option<Arc<Article>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Article(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Article(article) => Some(article),
            CachedValue::Names(_) => None,
        }
    }
}

/// Key-value cache collaborator. Entries may disappear at any time.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    fn set(&self, key: CacheKey, value: CachedValue);
}

/// In-process cache bounded by LRU eviction.
pub struct LruCacheBackend {
    entries: RwLock<LruCache<CacheKey, CachedValue>>,
}

impl LruCacheBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Get the number of cached entries.
    #[cfg(test)]
    fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }
}

impl CacheBackend for LruCacheBackend {
    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        rw_write(&self.entries, SOURCE, "get").get(key).cloned()
    }

    fn set(&self, key: CacheKey, value: CachedValue) {
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.clone(), value);
        if let Some((evicted_key, _)) = evicted {
            // `push` also hands back the old value when the key was already present.
            if evicted_key != key {
                counter!("blogpit_cache_evict_total", "lookup" => evicted_key.lookup.name())
                    .increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use crate::application::store::StoreVersion;

    use super::super::keys::Lookup;
    use super::*;

    fn key(version: &str, path: &str) -> CacheKey {
        CacheKey::new(Lookup::Sections, StoreVersion::new(version), path)
    }

    #[test]
    fn names_roundtrip_through_backend() {
        let backend = LruCacheBackend::new(&CacheConfig::default());
        assert!(backend.get(&key("1", "")).is_none());

        backend.set(key("1", ""), vec!["blog/".to_string()].into_cached());

        let cached = backend.get(&key("1", "")).expect("cached names");
        assert_eq!(
            Vec::<String>::from_cached(cached),
            Some(vec!["blog/".to_string()])
        );
        assert!(backend.get(&key("2", "")).is_none());
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let value = CachedValue::Names(Vec::new());
        assert!(Option::<Arc<Article>>::from_cached(value).is_none());
    }

    #[test]
    fn absent_article_is_a_cacheable_value() {
        let backend = LruCacheBackend::new(&CacheConfig::default());
        let article_key = CacheKey::new(Lookup::Article, StoreVersion::new("1"), "blog/x");
        backend.set(article_key.clone(), None::<Arc<Article>>.into_cached());

        let cached = backend.get(&article_key).expect("negative entry");
        assert_eq!(Option::<Arc<Article>>::from_cached(cached), Some(None));
    }

    #[test]
    fn lru_eviction() {
        let backend = LruCacheBackend::new(&CacheConfig {
            capacity: 2,
            ..Default::default()
        });

        backend.set(key("1", "a/"), CachedValue::Names(Vec::new()));
        backend.set(key("1", "b/"), CachedValue::Names(Vec::new()));
        assert!(backend.get(&key("1", "a/")).is_some());

        // "b/" is now least recently used.
        backend.set(key("1", "c/"), CachedValue::Names(Vec::new()));

        assert!(backend.get(&key("1", "b/")).is_none());
        assert!(backend.get(&key("1", "a/")).is_some());
        assert!(backend.get(&key("1", "c/")).is_some());
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn backend_recovers_from_poisoned_lock() {
        let backend = LruCacheBackend::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = backend
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        backend.set(key("1", ""), CachedValue::Names(Vec::new()));
        assert!(backend.get(&key("1", "")).is_some());
    }
}
