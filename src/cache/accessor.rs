//! Version-keyed memoization of store lookups.

use std::{future::Future, sync::Arc};

use metrics::counter;
use tracing::debug;

use crate::application::store::{ContentStore, StoreError, StoreVersion};

use super::keys::{CacheKey, Lookup};
use super::store::{CacheBackend, Cacheable};

const SOURCE: &str = "cache::accessor";

/// Wraps single-path lookups with a cache keyed on `(lookup, version, path)`.
///
/// Callers fetch the version once with [`Memoizer::pin`] and pass it to every
/// lookup that belongs to the same request. Without a backend the store
/// version is never consulted and every call goes straight to the lookup.
#[derive(Clone)]
pub struct Memoizer {
    cache: Option<Arc<dyn CacheBackend>>,
    store: Arc<dyn ContentStore>,
}

impl Memoizer {
    pub fn new(store: Arc<dyn ContentStore>, cache: Option<Arc<dyn CacheBackend>>) -> Self {
        Self { cache, store }
    }

    /// Current store version, or `None` when nothing is cached.
    pub async fn pin(&self) -> Result<Option<StoreVersion>, StoreError> {
        match self.cache {
            Some(_) => self.store.version().await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn call<T, E, F, Fut>(
        &self,
        version: Option<&StoreVersion>,
        lookup: Lookup,
        path: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Cacheable + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (Some(cache), Some(version)) = (self.cache.as_ref(), version) else {
            return compute().await;
        };

        let key = CacheKey::new(lookup, version.clone(), path);

        if let Some(value) = cache.get(&key).and_then(T::from_cached) {
            counter!("blogpit_cache_hit_total", "lookup" => lookup.name()).increment(1);
            debug!(target: SOURCE, key = %key, "cache hit");
            return Ok(value);
        }

        counter!("blogpit_cache_miss_total", "lookup" => lookup.name()).increment(1);
        debug!(target: SOURCE, key = %key, "cache miss");

        let value = compute().await?;
        cache.set(key, value.clone().into_cached());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::cache::{CacheConfig, LruCacheBackend};
    use crate::infra::store::MemoryStore;

    use super::*;

    fn memoizer(store: Arc<MemoryStore>, cached: bool) -> Memoizer {
        let cache = cached.then(|| {
            Arc::new(LruCacheBackend::new(&CacheConfig::default())) as Arc<dyn CacheBackend>
        });
        Memoizer::new(store, cache)
    }

    async fn names(memo: &Memoizer, calls: &AtomicUsize) -> Vec<String> {
        let version = memo.pin().await.unwrap();
        memo.call(version.as_ref(), Lookup::Sections, "", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StoreError>(vec!["blog/".to_string()])
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn without_cache_every_call_computes() {
        let memo = memoizer(Arc::new(MemoryStore::new()), false);
        let calls = AtomicUsize::new(0);

        names(&memo, &calls).await;
        names(&memo, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(memo.pin().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hit_skips_the_lookup() {
        let memo = memoizer(Arc::new(MemoryStore::new()), true);
        let calls = AtomicUsize::new(0);

        assert_eq!(names(&memo, &calls).await, vec!["blog/".to_string()]);
        assert_eq!(names(&memo, &calls).await, vec!["blog/".to_string()]);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn version_change_forces_recompute() {
        let store = Arc::new(MemoryStore::new());
        let memo = memoizer(Arc::clone(&store), true);
        let calls = AtomicUsize::new(0);

        names(&memo, &calls).await;
        store.insert("blog/a", Bytes::from_static(b"a"));
        names(&memo, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pinned_version_ignores_later_changes() {
        let store = Arc::new(MemoryStore::new());
        let memo = memoizer(Arc::clone(&store), true);
        let calls = AtomicUsize::new(0);
        let pinned = memo.pin().await.unwrap();

        let lookup = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StoreError>(vec!["a".to_string()])
        };
        let _: Vec<String> = memo
            .call(pinned.as_ref(), Lookup::Articles, "blog/", lookup)
            .await
            .unwrap();
        store.insert("blog/b", Bytes::from_static(b"b"));
        let _: Vec<String> = memo
            .call(pinned.as_ref(), Lookup::Articles, "blog/", lookup)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let fresh = memo.pin().await.unwrap();
        assert_ne!(fresh, pinned);
        let _: Vec<String> = memo
            .call(fresh.as_ref(), Lookup::Articles, "blog/", lookup)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let memo = memoizer(Arc::new(MemoryStore::new()), true);
        let calls = AtomicUsize::new(0);
        let version = memo.pin().await.unwrap();

        let failed: Result<Vec<String>, StoreError> = memo
            .call(version.as_ref(), Lookup::Articles, "blog/", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::unavailable("offline"))
            })
            .await;
        assert!(failed.is_err());

        let recovered: Vec<String> = memo
            .call(version.as_ref(), Lookup::Articles, "blog/", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(vec!["a".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(recovered, vec!["a".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
