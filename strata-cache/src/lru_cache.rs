// SPDX-License-Identifier: AGPL-3.0-or-later
//! LRU cache with count and age eviction
//!
//! Entries live in an [`lru::LruCache`], which keeps them in a linked chain
//! ordered by recency with a hash index into it; nodes never move in memory
//! when they are reordered. On top of that every entry carries the tick of a
//! 32-bit logical clock at which it was last touched, so stale entries can be
//! purged by age as well as by count. Age is `clock - tick` in wrapping
//! arithmetic, which stays correct when the clock overflows.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use crate::CacheStats;

type Deleter<K, V> = Box<dyn FnMut(K, V) + Send>;

struct Slot<V> {
    access_time: u32,
    value: V,
}

/// Bounded map evicting least recently used entries
///
/// A bound of `None` disables that criterion. Count eviction happens on every
/// insert; age eviction only when the clock moves, see
/// [`LruCache::advance_clock`].
///
/// An optional deleter is handed every entry the cache removes (purge,
/// [`remove`](LruCache::remove), [`lookup_or_remove`](LruCache::lookup_or_remove),
/// [`clear`](LruCache::clear)), exactly once. Overwriting a key in place and
/// dropping the cache do not call it.
pub struct LruCache<K, V> {
    entries: lru::LruCache<K, Slot<V>>,
    max_elem_count: Option<usize>,
    max_age: Option<u32>,
    clock: u32,
    deleter: Option<Deleter<K, V>>,
    stats: CacheStats,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    pub fn new(max_elem_count: Option<usize>, max_age: Option<u32>) -> Self {
        Self {
            entries: lru::LruCache::unbounded(),
            max_elem_count,
            max_age,
            clock: 0,
            deleter: None,
            stats: CacheStats::default(),
        }
    }

    /// A cache that only shrinks when asked to.
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Installs a callback that receives every entry the cache removes.
    pub fn with_deleter<F>(mut self, deleter: F) -> Self
    where
        F: FnMut(K, V) + Send + 'static,
    {
        self.deleter = Some(Box::new(deleter));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clock(&self) -> u32 {
        self.clock
    }

    pub fn limits(&self) -> (Option<usize>, Option<u32>) {
        (self.max_elem_count, self.max_age)
    }

    /// Changes the configured bounds and applies them right away.
    pub fn set_limits(&mut self, max_elem_count: Option<usize>, max_age: Option<u32>) {
        self.max_elem_count = max_elem_count;
        self.max_age = max_age;
        self.purge(max_elem_count, max_age);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { entries: self.entries.len() as u64, ..self.stats }
    }

    /// Ticks the logical clock, then purges with the configured bounds.
    pub fn advance_clock(&mut self) {
        self.clock = self.clock.wrapping_add(1);
        self.purge(self.max_elem_count, self.max_age);
    }

    /// Inserts or overwrites `key`, making it the most recently used entry.
    pub fn insert(&mut self, key: K, value: V) {
        let slot = Slot { access_time: self.clock, value };
        // An overwritten value is simply dropped; it was not evicted.
        self.entries.put(key, slot);
        self.purge(self.max_elem_count, self.max_age);
    }

    /// Looks `key` up and marks it as used now.
    pub fn lookup<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup_mut(key).map(|v| &*v)
    }

    pub fn lookup_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let clock = self.clock;
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.access_time = clock;
                self.stats.hit_count += 1;
                Some(&mut slot.value)
            }
            None => {
                self.stats.miss_count += 1;
                None
            }
        }
    }

    /// Looks `key` up, letting `is_stale` veto the hit.
    ///
    /// If `is_stale` returns true the entry is evicted on the spot and
    /// `None` is returned; otherwise this behaves like [`LruCache::lookup`].
    pub fn lookup_or_remove<Q, F>(&mut self, key: &Q, is_stale: F) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&Q, &V) -> bool,
    {
        let stale = match self.entries.peek(key) {
            Some(slot) => is_stale(key, &slot.value),
            None => {
                self.stats.miss_count += 1;
                return None;
            }
        };
        if stale {
            if let Some((k, slot)) = self.entries.pop_entry(key) {
                self.evict(k, slot.value);
            }
            self.stats.miss_count += 1;
            return None;
        }
        self.lookup(key)
    }

    /// Reads an entry without touching it.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.peek(key).map(|slot| &slot.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    /// Evicts `key`. Returns whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.pop_entry(key) {
            Some((k, slot)) => {
                self.evict(k, slot.value);
                true
            }
            None => false,
        }
    }

    /// Evicts entries from the least recently used end while there are more
    /// than `max_elem_count` of them or the oldest is more than `max_age`
    /// ticks old.
    pub fn purge(&mut self, max_elem_count: Option<usize>, max_age: Option<u32>) {
        if max_elem_count.is_none() && max_age.is_none() {
            return;
        }
        let mut evicted = 0usize;
        loop {
            let Some((_, oldest)) = self.entries.peek_lru() else {
                break;
            };
            let age = self.clock.wrapping_sub(oldest.access_time);
            let too_many = max_elem_count.map_or(false, |max| self.entries.len() > max);
            let too_old = max_age.map_or(false, |max| age > max);
            if !too_many && !too_old {
                break;
            }
            match self.entries.pop_lru() {
                Some((k, slot)) => self.evict(k, slot.value),
                None => break,
            }
            evicted += 1;
        }
        if evicted > 0 {
            tracing::trace!(evicted, remaining = self.entries.len(), "lru purge");
        }
    }

    /// Evicts everything, oldest first.
    pub fn clear(&mut self) {
        while let Some((k, slot)) = self.entries.pop_lru() {
            self.evict(k, slot.value);
        }
    }

    /// Entries from least to most recently used, without touching them.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().rev().map(|(k, slot)| (k, &slot.value))
    }

    fn evict(&mut self, key: K, value: V) {
        self.stats.eviction_count += 1;
        if let Some(deleter) = self.deleter.as_mut() {
            deleter(key, value);
        }
    }
}

impl<K: Hash + Eq, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.entries.len())
            .field("max_elem_count", &self.max_elem_count)
            .field("max_age", &self.max_age)
            .field("clock", &self.clock)
            .field("has_deleter", &self.deleter.is_some())
            .finish()
    }
}
