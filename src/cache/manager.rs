//! Cache Manager Module
//!
//! Main cache engine: HashMap storage with LRU bounding, per-entry TTL and
//! optional write-through to a durable store.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{
    approximate_size, current_timestamp_ms, CacheEntry, CacheOptions, CacheStats, KeyUsage,
    LruTracker, StatsReport,
};
use crate::storage::{namespace_prefix, storage_key, DurableStore};

// == Cache Manager ==
/// Namespaced TTL + LRU cache.
///
/// The in-memory map is authoritative. When the instance is persistent every
/// mutation is mirrored to the durable store after the map is updated;
/// store failures are logged and otherwise ignored.
pub struct CacheManager<T> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Hit/miss/eviction counters
    stats: CacheStats,
    options: CacheOptions,
    /// Present only for persistent instances
    store: Option<Arc<dyn DurableStore>>,
}

impl<T> CacheManager<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    // == Constructors ==
    /// Creates a cache that never touches durable storage.
    pub fn memory_only(options: CacheOptions) -> Self {
        if options.persistent {
            warn!(
                namespace = %options.namespace,
                "Persistence requested without a durable store, running memory-only"
            );
        }

        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            options,
            store: None,
        }
    }

    /// Creates a cache backed by `store`, hydrating from it when
    /// `options.persistent` is set. Non-persistent options drop the store.
    pub async fn new(options: CacheOptions, store: Arc<dyn DurableStore>) -> Self {
        if !options.persistent {
            return Self::memory_only(options);
        }

        let mut cache = Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            options,
            store: Some(store),
        };
        cache.hydrate().await;
        cache
    }

    // == Hydrate ==
    /// Loads this namespace's live records from the durable store.
    ///
    /// Corrupt records are skipped, expired ones are purged from the store.
    /// Only the `max_size` most recently accessed records are kept; the rest
    /// are evicted from the store.
    async fn hydrate(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let namespace = self.options.namespace.clone();
        let prefix = namespace_prefix(&namespace);

        let keys = match store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(operation = "list_keys", namespace = %namespace, error = %e, "Hydration failed, starting empty");
                return;
            }
        };

        let now = current_timestamp_ms();
        let mut loaded = Vec::new();
        let mut expired = Vec::new();

        for durable_key in keys {
            let Some(key) = durable_key.strip_prefix(&prefix) else {
                continue;
            };
            let key = key.to_string();

            let record = match store.get(&durable_key).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(operation = "get", namespace = %namespace, key = %key, error = %e, "Failed to read durable record");
                    continue;
                }
            };

            match serde_json::from_str::<CacheEntry<T>>(&record) {
                Ok(entry) if entry.is_expired_at(now) => expired.push(durable_key),
                Ok(entry) => loaded.push((key, entry)),
                Err(e) => {
                    warn!(operation = "deserialize", namespace = %namespace, key = %key, error = %e, "Skipping corrupt durable record");
                }
            }
        }

        // Oldest access first so the most recent ends up at the LRU front
        loaded.sort_by_key(|(_, entry)| entry.last_accessed_at);
        let overflow = loaded.len().saturating_sub(self.options.max_size);
        for (key, _) in loaded.drain(..overflow) {
            self.stats.record_eviction();
            expired.push(storage_key(&namespace, &key));
        }

        if !expired.is_empty() {
            if let Err(e) = store.delete_many(&expired).await {
                warn!(operation = "delete_many", namespace = %namespace, error = %e, "Failed to purge expired records");
            }
        }

        for (key, entry) in loaded {
            self.lru.touch(&key);
            self.entries.insert(key, entry);
        }

        info!(
            namespace = %namespace,
            loaded = self.entries.len(),
            purged = expired.len() - overflow,
            evicted = overflow,
            "Cache hydrated from durable store"
        );
    }

    // == Set ==
    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// Uses the instance default when `ttl` is None. If the insert pushes the
    /// count above `max_size`, exactly one least recently used entry is evicted.
    pub async fn set(&mut self, key: impl Into<String>, data: T, ttl: Option<Duration>) {
        self.set_with_tags(key, data, ttl, Vec::new()).await;
    }

    /// [`set`](Self::set) with invalidation tags, see
    /// [`clear_by_tags`](Self::clear_by_tags).
    pub async fn set_with_tags(
        &mut self,
        key: impl Into<String>,
        data: T,
        ttl: Option<Duration>,
        tags: Vec<String>,
    ) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.options.ttl);
        let size = approximate_size(&data);

        let mut entry = CacheEntry::new(data, ttl).with_tags(tags);
        entry.size = size;
        self.entries.insert(key.clone(), entry);
        self.lru.touch(&key);
        self.stats.record_set();

        let evicted = if self.entries.len() > self.options.max_size {
            self.evict_one()
        } else {
            None
        };

        self.persist(&key).await;
        if let Some(victim) = evicted {
            self.unpersist(&victim).await;
        }
    }

    // == Get ==
    /// Returns the value for `key`, or None if absent or expired.
    ///
    /// Counts a hit or a miss. A hit bumps the entry's access count and makes
    /// it the most recently used; an expired entry is removed.
    pub async fn get(&mut self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_miss();
            debug!(namespace = %self.options.namespace, key, "Expired entry removed on read");
            self.unpersist(key).await;
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.record_access();
        let data = entry.data.clone();
        self.lru.touch(key);
        self.stats.record_hit();

        self.persist(key).await;
        Some(data)
    }

    // == Has ==
    /// Existence check honoring expiry. Leaves stats and recency untouched.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes `key`. Returns whether an entry was present.
    pub async fn delete(&mut self, key: &str) -> bool {
        if !self.remove_entry(key) {
            return false;
        }
        self.stats.record_delete();
        self.unpersist(key).await;
        true
    }

    // == Clear By Tags ==
    /// Removes every entry carrying at least one of `tags`. Returns the
    /// number removed.
    pub async fn clear_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> usize {
        let matched: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_any_tag(tags))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matched {
            self.remove_entry(key);
        }
        self.unpersist_many(&matched).await;

        info!(namespace = %self.options.namespace, removed = matched.len(), "Cache cleared by tags");
        matched.len()
    }

    // == Clear ==
    /// Drops every entry and resets the counters.
    ///
    /// A persistent instance also deletes all durable keys under its
    /// namespace, including ones this process never loaded.
    pub async fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.stats.reset();

        if let Some(store) = &self.store {
            let prefix = namespace_prefix(&self.options.namespace);
            match store.list_keys().await {
                Ok(keys) => {
                    let ours: Vec<String> =
                        keys.into_iter().filter(|k| k.starts_with(&prefix)).collect();
                    if !ours.is_empty() {
                        if let Err(e) = store.delete_many(&ours).await {
                            warn!(operation = "delete_many", namespace = %self.options.namespace, error = %e, "Failed to clear durable records");
                        }
                    }
                }
                Err(e) => {
                    warn!(operation = "list_keys", namespace = %self.options.namespace, error = %e, "Failed to list durable records for clear");
                }
            }
        }

        info!(namespace = %self.options.namespace, removed, "Cache cleared");
    }

    // == Get Or Set ==
    /// Returns the cached value, or awaits `factory` once and caches its result.
    ///
    /// Concurrent callers missing on the same key each run their own factory;
    /// the last write wins.
    pub async fn get_or_set<F, Fut>(&mut self, key: &str, factory: F, ttl: Option<Duration>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(data) = self.get(key).await {
            return data;
        }

        let data = factory().await;
        self.set(key, data.clone(), ttl).await;
        data
    }

    /// Fallible [`get_or_set`](Self::get_or_set). A factory error is returned
    /// as-is and nothing is cached.
    pub async fn try_get_or_set<F, Fut, E>(
        &mut self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(data) = self.get(key).await {
            return Ok(data);
        }

        let data = factory().await?;
        self.set(key, data.clone(), ttl).await;
        Ok(data)
    }

    // == Warm ==
    /// Awaits each loader in turn and caches the values that resolve.
    ///
    /// Failed loaders are logged and skipped. Returns the number cached.
    pub async fn warm<I, Fut, E>(&mut self, loaders: I, ttl: Option<Duration>) -> usize
    where
        I: IntoIterator<Item = (String, Fut)>,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut total = 0;
        let mut loaded = 0;
        for (key, loader) in loaders {
            total += 1;
            match loader.await {
                Ok(data) => {
                    self.set(key, data, ttl).await;
                    loaded += 1;
                }
                Err(e) => {
                    warn!(namespace = %self.options.namespace, key = %key, error = %e, "Cache warming failed");
                }
            }
        }

        info!(namespace = %self.options.namespace, loaded, total, "Cache warmed");
        loaded
    }

    // == Batch ==
    /// Repeated [`get`](Self::get). Absent keys map to None.
    pub async fn get_many<I, K>(&mut self, keys: I) -> HashMap<String, Option<T>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut found = HashMap::new();
        for key in keys {
            let key = key.as_ref();
            let value = self.get(key).await;
            found.insert(key.to_string(), value);
        }
        found
    }

    /// Repeated [`set`](Self::set) over `(key, data, ttl)` triples.
    pub async fn set_many<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, T, Option<Duration>)>,
    {
        for (key, data, ttl) in entries {
            self.set(key, data, ttl).await;
        }
    }

    // == Touch ==
    /// Restarts a live entry's TTL window, with `ttl` or the instance default.
    ///
    /// Returns false without side effects for absent or expired entries.
    pub async fn touch(&mut self, key: &str, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.options.ttl);
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => entry.refresh(ttl),
            _ => return false,
        }

        self.lru.touch(key);
        self.persist(key).await;
        true
    }

    // == Cleanup ==
    /// Removes every expired entry. Returns the number removed.
    pub async fn cleanup(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }

        self.unpersist_many(&expired).await;
        expired.len()
    }

    // == Keys ==
    /// All current keys, sorted, optionally filtered by `pattern`.
    pub fn get_keys(&self, pattern: Option<&Regex>) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.map_or(true, |re| re.is_match(key)))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    // == Stats ==
    pub fn stats(&self) -> StatsReport {
        StatsReport::new(&self.stats, self.entries.values())
    }

    /// The `limit` most read keys with their sizes, most read first.
    pub fn top_keys(&self, limit: usize) -> Vec<KeyUsage> {
        let mut usage: Vec<KeyUsage> = self
            .entries
            .iter()
            .map(|(key, entry)| KeyUsage {
                key: key.clone(),
                hits: entry.access_count,
                size: entry.size,
            })
            .collect();
        usage.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.key.cmp(&b.key)));
        usage.truncate(limit);
        usage
    }

    // == Accessors ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Milliseconds left before a live entry expires, None if absent or
    /// already expired. Does not count as a read.
    pub fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining_ms)
    }

    /// Changes the TTL used by later writes without touching existing entries.
    pub fn set_default_ttl(&mut self, ttl: Duration) {
        self.options.ttl = ttl;
    }

    /// Changes the size bound, evicting least recently used entries right
    /// away until the cache fits.
    pub async fn set_max_size(&mut self, max_size: usize) {
        self.options.max_size = max_size;

        let mut evicted = Vec::new();
        while self.entries.len() > max_size {
            match self.evict_one() {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }
        self.unpersist_many(&evicted).await;
    }

    // == Internals ==
    fn remove_entry(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
        }
        removed
    }

    fn evict_one(&mut self) -> Option<String> {
        let victim = self.lru.evict_oldest()?;
        self.entries.remove(&victim);
        self.stats.record_eviction();
        debug!(namespace = %self.options.namespace, key = %victim, "Evicted least recently used entry");
        Some(victim)
    }

    async fn persist(&self, key: &str) {
        let (Some(store), Some(entry)) = (&self.store, self.entries.get(key)) else {
            return;
        };

        let record = match serde_json::to_string(entry) {
            Ok(record) => record,
            Err(e) => {
                warn!(operation = "serialize", namespace = %self.options.namespace, key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = store
            .set(&storage_key(&self.options.namespace, key), record)
            .await
        {
            warn!(operation = "set", namespace = %self.options.namespace, key, error = %e, "Durable write failed");
        }
    }

    async fn unpersist(&self, key: &str) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = store
            .delete(&storage_key(&self.options.namespace, key))
            .await
        {
            warn!(operation = "delete", namespace = %self.options.namespace, key, error = %e, "Durable delete failed");
        }
    }

    async fn unpersist_many(&self, keys: &[String]) {
        let Some(store) = &self.store else {
            return;
        };
        if keys.is_empty() {
            return;
        }

        let durable: Vec<String> = keys
            .iter()
            .map(|key| storage_key(&self.options.namespace, key))
            .collect();
        if let Err(e) = store.delete_many(&durable).await {
            warn!(operation = "delete_many", namespace = %self.options.namespace, error = %e, "Durable delete failed");
        }
    }
}

impl<T> fmt::Debug for CacheManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("namespace", &self.options.namespace)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn memory_cache(ttl_ms: u64, max_size: usize) -> CacheManager<String> {
        CacheManager::memory_only(
            CacheOptions::default()
                .with_ttl(Duration::from_millis(ttl_ms))
                .with_max_size(max_size),
        )
    }

    struct FailingStore;

    #[async_trait]
    impl DurableStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn set(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn delete_many(&self, _keys: &[String]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let mut cache = memory_cache(60_000, 10);

        cache.set("key1", "value1".to_string(), None).await;

        assert_eq!(cache.get("key1").await.as_deref(), Some("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_resets_entry() {
        let mut cache = memory_cache(60_000, 10);

        cache.set("key1", "value1".to_string(), None).await;
        cache.get("key1").await;
        cache.set("key1", "value2".to_string(), None).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.top_keys(1)[0].hits, 0);
        assert_eq!(cache.get("key1").await.as_deref(), Some("value2"));
    }

    #[tokio::test]
    async fn test_get_missing_counts_miss() {
        let mut cache = memory_cache(60_000, 10);

        assert_eq!(cache.get("nonexistent").await, None);

        let stats = cache.stats();
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.total_hits, 0);
    }

    #[tokio::test]
    async fn test_falsy_values_are_hits() {
        let mut cache: CacheManager<serde_json::Value> =
            CacheManager::memory_only(CacheOptions::default());

        cache.set("null", serde_json::Value::Null, None).await;
        cache.set("zero", serde_json::json!(0), None).await;
        cache.set("empty", serde_json::json!(""), None).await;

        assert_eq!(cache.get("null").await, Some(serde_json::Value::Null));
        assert_eq!(cache.get("zero").await, Some(serde_json::json!(0)));
        assert_eq!(cache.get("empty").await, Some(serde_json::json!("")));
        assert_eq!(cache.stats().total_hits, 3);
    }

    #[tokio::test]
    async fn test_ttl_expiration_scenario() {
        let mut cache = memory_cache(60_000, 10);

        cache
            .set("k", "v".to_string(), Some(Duration::from_millis(50)))
            .await;
        sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().total_misses, 1);
        assert!(cache.is_empty(), "Expired entry should be removed on read");
    }

    #[tokio::test]
    async fn test_lru_eviction_scenario() {
        let mut cache = memory_cache(1_000, 2);

        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;
        assert!(cache.get("a").await.is_some());
        cache.set("c", "3".to_string(), None).await;

        assert!(!cache.has("b"));
        assert!(cache.has("a"));
        assert!(cache.has("c"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let mut cache = memory_cache(60_000, 2);

        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;
        cache.set("a", "3".to_string(), None).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_zero_max_size_holds_nothing() {
        let mut cache = memory_cache(60_000, 0);

        cache.set("a", "1".to_string(), None).await;

        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_has_is_pure() {
        let mut cache = memory_cache(60_000, 10);
        cache.set("a", "1".to_string(), None).await;

        assert!(cache.has("a"));
        assert!(!cache.has("b"));

        let stats = cache.stats();
        assert_eq!(stats.total_hits, 0);
        assert_eq!(stats.total_misses, 0);
        assert_eq!(cache.top_keys(1)[0].hits, 0);
    }

    #[tokio::test]
    async fn test_has_honors_expiry() {
        let mut cache = memory_cache(60_000, 10);
        cache
            .set("a", "1".to_string(), Some(Duration::from_millis(20)))
            .await;

        sleep(Duration::from_millis(50)).await;

        assert!(!cache.has("a"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mut cache = memory_cache(60_000, 10);

        assert!(!cache.delete("k").await);
        cache.set("k", "v".to_string(), None).await;

        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let mut cache = memory_cache(60_000, 10);
        cache.set("a", "1".to_string(), None).await;
        cache.get("a").await;
        cache.get("missing").await;

        cache.clear().await;

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.total_hits, 0);
        assert_eq!(stats.total_misses, 0);
        assert_eq!(stats.oldest_entry_timestamp, 0);
    }

    #[tokio::test]
    async fn test_get_or_set_calls_factory_once() {
        let mut cache: CacheManager<u32> = CacheManager::memory_only(CacheOptions::default());
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let first = cache
            .get_or_set(
                "x",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    42
                },
                None,
            )
            .await;
        let second = cache
            .get_or_set(
                "x",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    99
                },
                None,
            )
            .await;

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.total_hits, 1);
    }

    #[tokio::test]
    async fn test_try_get_or_set_error_caches_nothing() {
        let mut cache: CacheManager<u32> = CacheManager::memory_only(CacheOptions::default());

        let result: Result<u32, String> = cache
            .try_get_or_set("x", || async { Err("upstream down".to_string()) }, None)
            .await;

        assert_eq!(result, Err("upstream down".to_string()));
        assert!(!cache.has("x"));

        let result: Result<u32, String> = cache
            .try_get_or_set("x", || async { Ok(7) }, None)
            .await;
        assert_eq!(result, Ok(7));
        assert!(cache.has("x"));
    }

    #[tokio::test]
    async fn test_get_many_and_set_many() {
        let mut cache = memory_cache(60_000, 10);

        cache
            .set_many(vec![
                ("a".to_string(), "1".to_string(), None),
                ("b".to_string(), "2".to_string(), Some(Duration::from_secs(1))),
            ])
            .await;

        let found = cache.get_many(["a", "b", "c"]).await;

        assert_eq!(found.len(), 3);
        assert_eq!(found["a"].as_deref(), Some("1"));
        assert_eq!(found["b"].as_deref(), Some("2"));
        assert_eq!(found["c"], None);
        assert_eq!(cache.stats().total_misses, 1);
    }

    #[tokio::test]
    async fn test_touch_extends_ttl() {
        let mut cache = memory_cache(60_000, 10);
        cache
            .set("a", "1".to_string(), Some(Duration::from_millis(60)))
            .await;

        sleep(Duration::from_millis(30)).await;
        assert!(cache.touch("a", Some(Duration::from_secs(10))).await);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get("a").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_touch_absent_or_expired() {
        let mut cache = memory_cache(60_000, 10);
        cache
            .set("a", "1".to_string(), Some(Duration::from_millis(10)))
            .await;
        sleep(Duration::from_millis(30)).await;

        assert!(!cache.touch("a", None).await);
        assert!(!cache.touch("missing", None).await);
        assert_eq!(cache.stats().total_misses, 0);
    }

    #[tokio::test]
    async fn test_touch_updates_recency() {
        let mut cache = memory_cache(60_000, 2);
        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;

        assert!(cache.touch("a", None).await);
        cache.set("c", "3".to_string(), None).await;

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let mut cache = memory_cache(60_000, 10);
        cache
            .set("short", "1".to_string(), Some(Duration::from_millis(20)))
            .await;
        cache.set("long", "2".to_string(), None).await;

        sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("long"));
        assert_eq!(cache.cleanup().await, 0);
    }

    #[tokio::test]
    async fn test_get_keys_with_pattern() {
        let mut cache = memory_cache(60_000, 10);
        for key in ["vehicle:1", "vehicle:2", "customer:1"] {
            cache.set(key, String::new(), None).await;
        }

        assert_eq!(cache.get_keys(None).len(), 3);

        let vehicles = Regex::new("^vehicle:").unwrap();
        assert_eq!(
            cache.get_keys(Some(&vehicles)),
            vec!["vehicle:1".to_string(), "vehicle:2".to_string()]
        );
        assert_eq!(cache.stats().total_hits + cache.stats().total_misses, 0);
    }

    #[tokio::test]
    async fn test_top_keys() {
        let mut cache = memory_cache(60_000, 10);
        cache.set("a", String::new(), None).await;
        cache.set("b", String::new(), None).await;
        cache.set("c", String::new(), None).await;
        for _ in 0..3 {
            cache.get("b").await;
        }
        cache.get("c").await;

        let top = cache.top_keys(2);

        assert_eq!(top.len(), 2);
        assert_eq!(
            top[0],
            KeyUsage {
                key: "b".into(),
                hits: 3,
                size: 2
            }
        );
        assert_eq!(top[1].key, "c");
        assert_eq!(top[1].hits, 1);
    }

    #[tokio::test]
    async fn test_set_and_delete_counters() {
        let mut cache = memory_cache(60_000, 10);
        cache.set("a", "1".to_string(), None).await;
        cache.set("a", "2".to_string(), None).await;
        cache.set("b", "3".to_string(), None).await;
        cache.delete("a").await;
        cache.delete("a").await;

        let stats = cache.stats();
        assert_eq!(stats.total_sets, 3);
        assert_eq!(stats.total_deletes, 1);

        cache.clear().await;
        assert_eq!(cache.stats().total_sets, 0);
    }

    #[tokio::test]
    async fn test_memory_usage_tracks_entry_sizes() {
        let mut cache: CacheManager<serde_json::Value> =
            CacheManager::memory_only(CacheOptions::default());

        cache.set("a", serde_json::json!({"a": 1}), None).await;
        cache.set("b", serde_json::json!("abc"), None).await;
        assert_eq!(cache.stats().memory_usage, 12);

        cache.delete("a").await;
        assert_eq!(cache.stats().memory_usage, 5);
    }

    #[tokio::test]
    async fn test_clear_by_tags() {
        let store = MemoryStore::new();
        let options = CacheOptions::new("ns").with_persistence(true);
        let mut cache: CacheManager<String> =
            CacheManager::new(options, Arc::new(store.clone())).await;

        cache
            .set_with_tags("v1", "a".into(), None, vec!["vehicles".into()])
            .await;
        cache
            .set_with_tags(
                "r1",
                "b".into(),
                None,
                vec!["rentals".into(), "vehicles".into()],
            )
            .await;
        cache
            .set_with_tags("c1", "c".into(), None, vec!["customers".into()])
            .await;
        cache.set("plain", "d".into(), None).await;

        assert_eq!(cache.clear_by_tags(&["vehicles"]).await, 2);

        assert_eq!(
            cache.get_keys(None),
            vec!["c1".to_string(), "plain".to_string()]
        );
        let mut durable = store.list_keys().await.unwrap();
        durable.sort();
        assert_eq!(durable, vec!["cache_ns_c1".to_string(), "cache_ns_plain".to_string()]);
        assert_eq!(cache.clear_by_tags(&["unknown"]).await, 0);
    }

    #[tokio::test]
    async fn test_warm_skips_failed_loaders() {
        async fn load(result: Result<u32, String>) -> Result<u32, String> {
            result
        }

        let mut cache: CacheManager<u32> = CacheManager::memory_only(CacheOptions::default());

        let loaded = cache
            .warm(
                vec![
                    ("a".to_string(), load(Ok(1))),
                    ("b".to_string(), load(Err("upstream down".to_string()))),
                    ("c".to_string(), load(Ok(3))),
                ],
                None,
            )
            .await;

        assert_eq!(loaded, 2);
        assert_eq!(cache.get_keys(None), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(cache.stats().total_sets, 2);
    }

    #[tokio::test]
    async fn test_shrinking_max_size_evicts_immediately() {
        let store = MemoryStore::new();
        let options = CacheOptions::new("ns").with_persistence(true);
        let mut cache: CacheManager<u32> =
            CacheManager::new(options, Arc::new(store.clone())).await;
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            cache.set(key, i as u32, None).await;
        }
        cache.get("a").await;

        cache.set_max_size(2).await;

        assert_eq!(cache.get_keys(None), vec!["a".to_string(), "d".to_string()]);
        assert_eq!(cache.stats().evictions, 2);
        assert_eq!(store.len().await, 2);

        cache.set("e", 5, None).await;
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let mut cache = memory_cache(60_000, 10);
        cache
            .set("a", "1".to_string(), Some(Duration::from_secs(10)))
            .await;
        cache
            .set("b", "2".to_string(), Some(Duration::from_millis(10)))
            .await;
        sleep(Duration::from_millis(30)).await;

        let remaining = cache.ttl_remaining_ms("a").unwrap();
        assert!(remaining <= 10_000 && remaining >= 9_000);
        assert_eq!(cache.ttl_remaining_ms("b"), None);
        assert_eq!(cache.ttl_remaining_ms("missing"), None);
        assert_eq!(cache.stats().total_hits, 0);
    }

    #[tokio::test]
    async fn test_stats_timestamps() {
        let mut cache = memory_cache(60_000, 10);
        let before = current_timestamp_ms();
        cache.set("a", String::new(), None).await;
        cache.set("b", String::new(), None).await;

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert!(stats.oldest_entry_timestamp >= before);
        assert!(stats.newest_entry_timestamp >= stats.oldest_entry_timestamp);
    }

    #[tokio::test]
    async fn test_default_ttl_change_applies_to_later_writes() {
        let mut cache = memory_cache(60_000, 10);
        cache.set("old", String::new(), None).await;

        cache.set_default_ttl(Duration::from_millis(10));
        cache.set("new", String::new(), None).await;
        sleep(Duration::from_millis(30)).await;

        assert!(cache.has("old"));
        assert!(!cache.has("new"));
    }

    #[tokio::test]
    async fn test_memory_only_ignores_persistent_flag() {
        let cache: CacheManager<String> =
            CacheManager::memory_only(CacheOptions::default().with_persistence(true));

        assert!(!cache.is_persistent());
    }

    #[tokio::test]
    async fn test_non_persistent_options_skip_store() {
        let store = MemoryStore::new();
        let mut cache: CacheManager<String> =
            CacheManager::new(CacheOptions::new("plain"), Arc::new(store.clone())).await;

        cache.set("a", "1".to_string(), None).await;

        assert!(!cache.is_persistent());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_write_through_and_delete_mirror() {
        let store = MemoryStore::new();
        let options = CacheOptions::new("ns").with_persistence(true);
        let mut cache: CacheManager<String> =
            CacheManager::new(options, Arc::new(store.clone())).await;

        cache.set("a", "1".to_string(), None).await;
        assert!(store.get("cache_ns_a").await.unwrap().is_some());

        cache.delete("a").await;
        assert!(store.get("cache_ns_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eviction_removes_mirror() {
        let store = MemoryStore::new();
        let options = CacheOptions::new("ns")
            .with_persistence(true)
            .with_max_size(1);
        let mut cache: CacheManager<String> =
            CacheManager::new(options, Arc::new(store.clone())).await;

        cache.set("a", "1".to_string(), None).await;
        cache.set("b", "2".to_string(), None).await;

        assert_eq!(store.list_keys().await.unwrap(), vec!["cache_ns_b".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_store_is_swallowed() {
        let options = CacheOptions::new("ns").with_persistence(true);
        let mut cache: CacheManager<String> =
            CacheManager::new(options, Arc::new(FailingStore)).await;

        assert!(cache.is_persistent());
        assert!(cache.is_empty());

        cache.set("a", "1".to_string(), None).await;
        assert_eq!(cache.get("a").await.as_deref(), Some("1"));
        assert!(cache.touch("a", None).await);
        assert!(cache.delete("a").await);
        cache.set("b", "2".to_string(), Some(Duration::ZERO)).await;
        sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.cleanup().await, 1);
        cache.clear().await;
        assert!(cache.is_empty());
    }
}
