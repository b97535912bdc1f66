use std::collections::HashMap;
use std::hash::Hash;

use reconflow_core::{RegionId, Vector2};

/// Objective a cached lookup belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Objective {
    /// The enemy's main base.
    Main,
    /// The enemy's natural expansion.
    Expansion,
}

/// Operation whose result is memoised by the scout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Region containing the objective.
    ObjectiveRegion(Objective),
    /// Centre of the chokepoint closest to the objective.
    ObjectiveWaypoint(Objective),
}

/// Result of a memoised operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CachedValue {
    /// Resolved region, if any.
    Region(Option<RegionId>),
    /// Resolved point, if any.
    Point(Option<Vector2>),
}

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    remaining: u32,
}

/// Memo cache whose entries expire after a fixed number of ticks.
///
/// Independently of the per-entry time to live the whole cache is cleared
/// every `reset_interval` ticks.
#[derive(Clone, Debug)]
pub struct MemoCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: u32,
    reset_interval: u64,
    ticks_since_reset: u64,
}

impl<K: Eq + Hash, V: Clone> MemoCache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: u32, reset_interval: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            reset_interval,
            ticks_since_reset: 0,
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> V {
        let ttl = self.ttl;
        self.entries
            .entry(key)
            .or_insert_with(|| Entry {
                value: compute(),
                remaining: ttl,
            })
            .value
            .clone()
    }

    /// Cached value for `key`, if still alive.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Drops a single entry, returning its value.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Ages every entry by one tick and applies the periodic reset.
    pub fn tick(&mut self) {
        self.ticks_since_reset += 1;
        if self.reset_interval > 0 && self.ticks_since_reset >= self.reset_interval {
            self.ticks_since_reset = 0;
            self.clear();
            return;
        }

        self.entries.retain(|_, entry| {
            entry.remaining = entry.remaining.saturating_sub(1);
            entry.remaining > 0
        });
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_computed_once_while_alive() {
        let mut cache: MemoCache<CacheTag, u32> = MemoCache::new(3, 100);
        let tag = CacheTag::ObjectiveRegion(Objective::Main);
        let mut calls = 0;

        for _ in 0..2 {
            let value = cache.get_or_insert_with(tag, || {
                calls += 1;
                7
            });
            assert_eq!(value, 7);
            cache.tick();
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn entries_expire_after_their_time_to_live() {
        let mut cache: MemoCache<CacheTag, u32> = MemoCache::new(2, 100);
        let tag = CacheTag::ObjectiveWaypoint(Objective::Expansion);
        let _ = cache.get_or_insert_with(tag, || 1);

        cache.tick();
        assert_eq!(cache.get(&tag), Some(&1));
        cache.tick();
        assert!(cache.get(&tag).is_none());
    }

    #[test]
    fn periodic_reset_clears_everything() {
        let mut cache: MemoCache<u8, u8> = MemoCache::new(1_000, 4);
        let _ = cache.get_or_insert_with(1, || 1);
        let _ = cache.get_or_insert_with(2, || 2);

        for _ in 0..3 {
            cache.tick();
        }
        assert_eq!(cache.len(), 2);
        cache.tick();
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidated_entries_are_recomputed() {
        let mut cache: MemoCache<u8, u8> = MemoCache::new(10, 0);
        let _ = cache.get_or_insert_with(1, || 1);
        assert_eq!(cache.invalidate(&1), Some(1));
        assert_eq!(cache.get_or_insert_with(1, || 9), 9);
        cache.clear();
        assert!(cache.is_empty());
    }
}
