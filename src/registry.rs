//! Cache Registry
//!
//! Owns the named cache instances an application wires up at startup and
//! hands out shared references to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheManager, CacheOptions};
use crate::config::Config;
use crate::error::{RegistryError, StoreError};
use crate::storage::{namespace_prefix, DurableStore, FileStore};

/// A cache instance shared between tasks.
pub type SharedCache = Arc<RwLock<CacheManager<Value>>>;

// == Cache Registry ==
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: BTreeMap<String, SharedCache>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard instances: `memory`, `persistent`, `api`, `images`.
    ///
    /// Persistent ones share a [`FileStore`] under `config.storage_dir`.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store: Arc<dyn DurableStore> = Arc::new(FileStore::open(&config.storage_dir).await?);
        Ok(Self::with_store(store).await)
    }

    /// Builds the standard instances on top of an arbitrary durable store.
    pub async fn with_store(store: Arc<dyn DurableStore>) -> Self {
        let mut registry = Self::new();
        for options in [
            CacheOptions::memory(),
            CacheOptions::persistent(),
            CacheOptions::api(),
            CacheOptions::images(),
        ] {
            registry.insert(CacheManager::new(options, store.clone()).await);
        }
        registry
    }

    /// Adds a cache under its namespace, replacing any previous one.
    ///
    /// Rejects a namespace whose durable prefix overlaps another registered
    /// one (`api` and `api_v2`), since hydrate and clear would then reach
    /// into each other's records.
    pub fn register(&mut self, cache: CacheManager<Value>) -> Result<SharedCache, RegistryError> {
        let namespace = cache.namespace();
        if let Some(existing) = self
            .caches
            .keys()
            .find(|existing| namespaces_overlap(existing, namespace))
        {
            debug!(namespace, existing = %existing, "Rejected overlapping namespace");
            return Err(RegistryError::NamespaceOverlap {
                namespace: namespace.to_string(),
                existing: existing.clone(),
            });
        }
        Ok(self.insert(cache))
    }

    fn insert(&mut self, cache: CacheManager<Value>) -> SharedCache {
        let name = cache.namespace().to_string();
        let shared = Arc::new(RwLock::new(cache));
        self.caches.insert(name, shared.clone());
        shared
    }

    pub fn get(&self, name: &str) -> Option<SharedCache> {
        self.caches.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedCache)> {
        self.caches.iter().map(|(name, cache)| (name.as_str(), cache))
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Runs `cleanup()` on every instance. Returns the total removed.
    pub async fn cleanup_all(&self) -> usize {
        let mut removed = 0;
        for (name, cache) in &self.caches {
            let count = cache.write().await.cleanup().await;
            if count > 0 {
                info!(namespace = %name, removed = count, "Expired entries removed");
            }
            removed += count;
        }
        removed
    }
}

/// True when one namespace's durable prefix is a prefix of the other's.
fn namespaces_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let (a, b) = (namespace_prefix(a), namespace_prefix(b));
    a.starts_with(&b) || b.starts_with(&a)
}
