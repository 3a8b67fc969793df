//! TTL Store Module
//!
//! Key to (value, expiry) map with lazy expiry and prefix invalidation.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStats};

// == TTL Store ==
/// Unbounded in-memory store where every entry carries its own TTL.
///
/// There is no background sweeper and no size-based eviction. Entries leave
/// the store through `delete`, `invalidate_prefix`, or a `get` that finds
/// them expired.
#[derive(Debug)]
pub struct TtlStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
}

impl<V: Clone> TtlStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Set ==
    /// Stores `value` under `key`, fresh for `ttl` from now.
    ///
    /// An existing entry is overwritten unconditionally and its expiry reset.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(key.into(), CacheEntry::new(value, ttl));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired.
    ///
    /// A read that finds an expired entry deletes it before reporting a miss,
    /// so an expired value is never served and never lingers after being
    /// observed.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                self.stats.set_total_entries(self.entries.len());
                None
            }
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes `key` if present. Absent keys are not an error.
    pub fn delete(&mut self, key: &str) {
        self.entries.remove(key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Invalidate Prefix ==
    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the number of removed entries; zero is a successful no-op.
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();

        self.stats.record_invalidated(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Invalidate Scope ==
    /// Removes the entry stored exactly at `exact` plus every entry under
    /// `prefix`.
    ///
    /// A scope key built without a page or segment has no trailing
    /// separator, so the prefix alone never matches it.
    pub fn invalidate_scope(&mut self, exact: &str, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key != exact && !key.starts_with(prefix));
        let removed = before - self.entries.len();

        self.stats.record_invalidated(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Contains ==
    /// Checks for a stored entry without touching stats or expiry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
