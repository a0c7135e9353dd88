use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

struct Inner<K> {
    order: VecDeque<K>,
    members: HashSet<K>,
}

/// Size-bounded set of keys with batch eviction.
///
/// Once the cache holds more than `capacity` keys, the oldest keys (by
/// insertion order) are dropped in one pass until only the newest
/// `capacity / 2` remain. This is not LRU: a repeated lookup does not refresh
/// a key's position.
///
/// Test-and-set happens under one lock, so two concurrent deliveries of the
/// same key can never both observe "not present".
pub struct BoundedKeyCache<K: Hash + Eq + Clone> {
    inner: Mutex<Inner<K>>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone> BoundedKeyCache<K> {
    /// Create a cache bounded to `capacity` keys (at least 2).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(capacity + 1),
                members: HashSet::with_capacity(capacity + 1),
            }),
            capacity,
        }
    }

    /// Atomic test-and-set.
    ///
    /// Returns `true` if `key` was already present (duplicate). Otherwise
    /// inserts it, evicts if the bound is exceeded, and returns `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use slack_relay_core::cache::BoundedKeyCache;
    ///
    /// let cache = BoundedKeyCache::new(4);
    /// assert!(!cache.contains_and_insert("E1"));
    /// assert!(cache.contains_and_insert("E1"));
    /// ```
    pub fn contains_and_insert(&self, key: K) -> bool {
        // Data stays consistent across every critical section, so a poisoned
        // lock is safe to reuse.
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.members.contains(&key) {
            return true;
        }

        inner.members.insert(key.clone());
        inner.order.push_back(key);

        if inner.order.len() > self.capacity {
            let keep = self.retained_after_eviction();
            let Inner { order, members } = &mut *inner;
            let evict = order.len() - keep;
            for old in order.drain(..evict) {
                members.remove(&old);
            }
            debug!(evicted = evict, retained = keep, "Event cache batch eviction");
        }

        false
    }

    /// Whether `key` is currently remembered (diagnostics only).
    pub fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.members.contains(key)
    }

    /// Number of remembered keys.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.order.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound `N`.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    const fn retained_after_eviction(&self) -> usize {
        let half = self.capacity / 2;
        if half == 0 {
            1
        } else {
            half
        }
    }
}
