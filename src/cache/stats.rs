//! Cache Statistics Module
//!
//! Hit/miss/eviction counters and the report built from them.

use serde::Serialize;

use crate::cache::CacheEntry;

// == Cache Stats ==
/// Running counters for one cache instance. Reset only by `clear()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub sets: u64,
    pub deletes: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Complement of [`hit_rate`](Self::hit_rate), also 0.0 with no reads.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }
}

// == Stats Report ==
/// Point-in-time view of a cache instance.
///
/// Entry timestamps are Unix milliseconds of the oldest and newest
/// `created_at` among current entries, and 0 when the cache is empty.
/// `memory_usage` sums the approximate byte size of every live entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub evictions: u64,
    pub total_sets: u64,
    pub total_deletes: u64,
    pub memory_usage: usize,
    pub oldest_entry_timestamp: u64,
    pub newest_entry_timestamp: u64,
}

impl StatsReport {
    /// Builds a report from counters and the current entries.
    pub fn new<'a, T: 'a>(
        stats: &CacheStats,
        entries: impl IntoIterator<Item = &'a CacheEntry<T>>,
    ) -> Self {
        let mut size = 0;
        let mut memory_usage = 0;
        let mut oldest = u64::MAX;
        let mut newest = 0;
        for entry in entries {
            size += 1;
            memory_usage += entry.size;
            oldest = oldest.min(entry.created_at);
            newest = newest.max(entry.created_at);
        }

        Self {
            size,
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            total_hits: stats.hits,
            total_misses: stats.misses,
            evictions: stats.evictions,
            total_sets: stats.sets,
            total_deletes: stats.deletes,
            memory_usage,
            oldest_entry_timestamp: if size == 0 { 0 } else { oldest },
            newest_entry_timestamp: newest,
        }
    }
}

/// Per-key access count and size, as reported by `top_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyUsage {
    pub key: String,
    pub hits: u64,
    pub size: usize,
}
