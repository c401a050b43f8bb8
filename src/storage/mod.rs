//! Durable Store Module
//!
//! The key/value capability a persistent cache mirrors its entries into.
//! Implementations are injected into `CacheManager::new`.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::{MemoryStore, NoopStore};

// == Durable Store ==
/// Async string key/value store backing persistent caches.
///
/// Values are opaque serialized records. Errors are reported, never
/// retried: the cache treats a failed call as if it had not happened.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Every key currently held, in no particular order.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// Prefix shared by every durable key of a namespace.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("cache_{}_", namespace)
}

/// Durable key for `key` in `namespace`: `cache_<namespace>_<key>`.
pub fn storage_key(namespace: &str, key: &str) -> String {
    format!("cache_{}_{}", namespace, key)
}
