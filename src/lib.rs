//! ttl_cache - Namespaced in-memory cache with TTL expiry and LRU eviction
//!
//! Each [`CacheManager`] bounds its size with LRU eviction, expires entries
//! per their TTL, tracks hit/miss statistics and can mirror every write
//! into an injected [`DurableStore`]. A [`CacheRegistry`] owns the named
//! instances an application wires up; the binary adds a periodic cleanup
//! sweep and a small admin HTTP surface on top.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, CacheOptions, StatsReport};
pub use config::Config;
pub use registry::{CacheRegistry, SharedCache};
pub use storage::{DurableStore, FileStore, MemoryStore, NoopStore};
pub use tasks::spawn_cleanup_task;
