// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded in-memory caching for Strata
//!
//! [`LruCache`] evicts by element count and by age measured on a logical
//! clock. The VFS uses it to memoize fingerprints; higher layers can use it
//! for anything expensive to rebuild, such as compiled artifacts.

pub mod lru_cache;

pub use lru_cache::LruCache;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 { 0.0 } else { self.hit_count as f64 / total as f64 }
    }
}
