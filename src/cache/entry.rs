//! Cache Entry Module
//!
//! Defines a single cached record with its TTL and access bookkeeping.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value plus the metadata that drives expiry and LRU eviction.
///
/// Serialized as-is into the durable store, so every field survives a
/// JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Validity window measured from `created_at`
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
    /// Number of successful reads
    pub access_count: u64,
    /// Last successful read or write (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Labels used for group invalidation
    #[serde(default)]
    pub tags: Vec<String>,
    /// Approximate serialized size of `data` in bytes
    #[serde(default)]
    pub size: usize,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    pub fn new(data: T, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed_at: now,
            tags: Vec::new(),
            size: 0,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// True if the entry carries at least one of `tags`.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        self.tags
            .iter()
            .any(|own| tags.iter().any(|tag| tag.as_ref() == own))
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against an explicit clock reading.
    ///
    /// Boundary condition: the entry is expired only once strictly more than
    /// `ttl` has elapsed, so at exactly `created_at + ttl` it is still live.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > ttl_ms(self.ttl)
    }

    // == Access Bookkeeping ==
    /// Records a successful read.
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = current_timestamp_ms();
    }

    /// Restarts the validity window with a new TTL.
    pub fn refresh(&mut self, ttl: Duration) {
        let now = current_timestamp_ms();
        self.created_at = now;
        self.last_accessed_at = now;
        self.ttl = ttl;
    }

    /// Timestamp after which the entry is treated as absent.
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(ttl_ms(self.ttl))
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once elapsed.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at().saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Length of the JSON encoding of `data`, 0 if it cannot be encoded.
pub fn approximate_size<T: Serialize>(data: &T) -> usize {
    serde_json::to_vec(data).map_or(0, |bytes| bytes.len())
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::ttl_ms(*ttl))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
