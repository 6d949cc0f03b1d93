//! Bounded memoization for the pure string functions on the scan path.
//!
//! Normalization and id extraction run for every link on every scan, and a
//! long-lived page session would otherwise grow these caches without limit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

// =============================================================================
// LRU Cache
// =============================================================================

struct Entry<V> {
    value: V,
    stamp: u64,
}

/// Fixed-capacity least-recently-used cache keyed by string.
pub struct LruCache<V> {
    capacity: usize,
    entries: HashMap<String, Entry<V>>,
    /// Recency index: stamp -> key, oldest first.
    order: BTreeMap<u64, String>,
    clock: u64,
}

impl<V: Clone> LruCache<V> {
    /// Create a new LRU cache with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            clock: 0,
        }
    }

    /// Get a value from the cache, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.clock += 1;
        let stamp = self.clock;
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, key.to_string());
        Some(entry.value.clone())
    }

    /// Insert a value, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: String, value: V) {
        self.clock += 1;
        let stamp = self.clock;

        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.stamp);
        } else if self.entries.len() >= self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.entries.remove(&oldest);
            }
        }

        self.order.insert(stamp, key.clone());
        self.entries.insert(key, Entry { value, stamp });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

// =============================================================================
// Memoized function
// =============================================================================

/// A pure `&str -> V` function paired with a shared bounded cache.
pub struct Memo<V> {
    cache: Mutex<LruCache<V>>,
    compute: fn(&str) -> V,
}

impl<V: Clone> Memo<V> {
    pub fn new(capacity: usize, compute: fn(&str) -> V) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            compute,
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// The lock is not held while computing, so concurrent misses on the same
    /// key may both compute; the results are identical.
    pub fn get(&self, key: &str) -> V {
        if let Some(hit) = self.lock().get(key) {
            return hit;
        }
        let value = (self.compute)(key);
        self.lock().insert(key.to_string(), value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<V>> {
        // A panic while holding the lock leaves the cache consistent enough to reuse.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
