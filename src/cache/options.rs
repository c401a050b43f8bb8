//! Cache Options Module
//!
//! Per-instance configuration: default TTL, size bound, persistence and namespace.

use std::time::Duration;

/// Default time-to-live for entries set without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of entries per instance.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

// == Cache Options ==
/// Configuration fixed at construction of a `CacheManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// TTL applied when `set` is called without one
    pub ttl: Duration,
    /// Entry count above which one LRU entry is evicted
    pub max_size: usize,
    /// Mirror entries into the durable store
    pub persistent: bool,
    /// Isolates this instance's durable keys
    pub namespace: String,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            persistent: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl CacheOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_persistence(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    // == Presets ==
    /// Short-lived, memory-only cache for computed data.
    pub fn memory() -> Self {
        Self::new("memory").with_ttl(Duration::from_secs(5 * 60))
    }

    /// Long-lived cache mirrored to durable storage.
    pub fn persistent() -> Self {
        Self::new("persistent")
            .with_ttl(Duration::from_secs(24 * 60 * 60))
            .with_max_size(500)
            .with_persistence(true)
    }

    /// Network response cache.
    pub fn api() -> Self {
        Self::new("api")
            .with_ttl(Duration::from_secs(2 * 60))
            .with_max_size(200)
    }

    /// Image metadata cache, kept across restarts.
    pub fn images() -> Self {
        Self::new("images")
            .with_ttl(Duration::from_secs(60 * 60))
            .with_max_size(300)
            .with_persistence(true)
    }
}
