//! Bounded key-value store with FIFO eviction.
//!
//! Entries are kept in insertion order. When the store is full the oldest
//! entry is evicted, never by score or importance. Used for per-twin
//! simulation history, but independent of it so the retention rules can be
//! tested on their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_model::BoundedStore;
//!
//! let mut store = BoundedStore::new(2);
//! store.insert("a", 1);
//! store.insert("b", 2);
//! let evicted = store.insert("c", 3);
//! assert_eq!(evicted, Some(("a", 1)));
//! ```

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Statistics about a bounded store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total entries ever inserted.
    pub total_inserted: u64,
    /// Current number of entries.
    pub current_size: usize,
    /// Entries evicted by the capacity cap.
    pub capacity_evictions: u64,
    /// Entries evicted by a retention predicate.
    pub retention_evictions: u64,
}

/// A capacity-bounded map that evicts the oldest entry first.
#[derive(Debug, Clone)]
pub struct BoundedStore<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    entries: HashMap<K, V>,
    stats: StoreStats,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a store holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
            stats: StoreStats::default(),
        }
    }

    /// Inserts an entry as the newest, returning the evicted entry if the
    /// store was full.
    ///
    /// Re-inserting an existing key replaces its value and moves it to the
    /// newest position.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.stats.total_inserted += 1;

        if self.entries.insert(key.clone(), value).is_some() {
            self.order.retain(|k| k != &key);
            self.order.push_back(key);
            return None;
        }
        self.order.push_back(key);

        let evicted = if self.order.len() > self.capacity {
            self.pop_oldest()
        } else {
            None
        };
        if evicted.is_some() {
            self.stats.capacity_evictions += 1;
        }
        self.stats.current_size = self.entries.len();
        evicted
    }

    /// Evicts entries from the oldest end while `expired` holds.
    ///
    /// Stops at the first entry that is not expired. Returns the number of
    /// entries removed.
    pub fn evict_while<F>(&mut self, mut expired: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let mut removed = 0;
        while let Some(oldest) = self.order.front() {
            let is_expired = self.entries.get(oldest).map_or(true, &mut expired);
            if !is_expired {
                break;
            }
            self.pop_oldest();
            removed += 1;
        }
        self.stats.retention_evictions += removed as u64;
        self.stats.current_size = self.entries.len();
        removed
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let key = self.order.pop_front()?;
        let value = self.entries.remove(&key)?;
        Some((key, value))
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Removes an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.stats.current_size = self.entries.len();
        Some(value)
    }

    /// Iterates values from oldest to newest.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    /// Returns the newest value.
    #[must_use]
    pub fn newest(&self) -> Option<&V> {
        self.order.back().and_then(|k| self.entries.get(k))
    }

    /// Returns the current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns statistics about the store.
    #[must_use]
    pub const fn stats(&self) -> StoreStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_first() {
        let mut store = BoundedStore::new(3);
        for i in 0..3 {
            assert!(store.insert(i, i * 10).is_none());
        }
        assert_eq!(store.insert(3, 30), Some((0, 0)));
        assert_eq!(store.values().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(store.newest(), Some(&30));
        assert_eq!(store.stats().capacity_evictions, 1);
    }

    #[test]
    fn reinsert_refreshes_position() {
        let mut store = BoundedStore::new(2);
        store.insert("a", 1);
        store.insert("b", 2);
        store.insert("a", 3);
        assert_eq!(store.insert("c", 4), Some(("b", 2)));
        assert_eq!(store.get(&"a"), Some(&3));
    }

    #[test]
    fn retention_stops_at_first_live_entry() {
        let mut store = BoundedStore::new(10);
        for (k, age) in [("old", 40), ("live", 1), ("older", 50)] {
            store.insert(k, age);
        }
        assert_eq!(store.evict_while(|age| *age > 30), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().retention_evictions, 1);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut store = BoundedStore::new(0);
        store.insert(1, ());
        store.insert(2, ());
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&2).is_some());
    }

    #[test]
    fn remove_drops_from_order() {
        let mut store = BoundedStore::new(4);
        store.insert(1, 'a');
        store.insert(2, 'b');
        assert_eq!(store.remove(&1), Some('a'));
        assert_eq!(store.values().copied().collect::<Vec<_>>(), vec!['b']);
        assert!(store.remove(&1).is_none());
    }

    proptest! {
        #[test]
        fn keeps_exactly_the_newest(cap in 1usize..20, extra in 0usize..40) {
            let mut store = BoundedStore::new(cap);
            let total = cap + extra;
            for i in 0..total {
                store.insert(i, i);
            }
            prop_assert_eq!(store.len(), cap);
            let kept: Vec<usize> = store.values().copied().collect();
            let expected: Vec<usize> = (extra..total).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
