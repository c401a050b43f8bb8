//! Cache Module
//!
//! In-memory caching with TTL expiration, LRU eviction and optional
//! write-through persistence.

mod entry;
mod lru;
mod manager;
mod options;
mod stats;


// Re-export public types
pub use entry::{approximate_size, current_timestamp_ms, CacheEntry};
pub use lru::LruTracker;
pub use manager::CacheManager;
pub use options::{CacheOptions, DEFAULT_MAX_SIZE, DEFAULT_NAMESPACE, DEFAULT_TTL};
pub use stats::{CacheStats, KeyUsage, StatsReport};
