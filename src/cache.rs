//! Layer G — bounded LRU caches for parsed records.
//!
//! The core is single-threaded by design (spec §5): there is no internal
//! locking anywhere in this crate, and [`crate::hive::Hive`] is `!Sync`.
//! Callers who need concurrent access wrap a `Hive` themselves (one per
//! thread, or behind their own mutex) rather than this crate paying for
//! synchronization nobody asked for. That makes a plain `RefCell` the
//! right interior-mutability tool here, holding an `lru::LruCache` per
//! record kind (named keys, value keys) rather than ever growing without
//! bound.
//!
//! Eviction drops a record outright — there is no write-back, since this
//! crate never mutates a hive. A reacquire after eviction just reparses
//! the cell from the underlying byte source.

use std::cell::RefCell;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Default capacity for a record cache, chosen to comfortably hold a
/// typical interactive traversal's working set without growing unbounded
/// on a full-hive walk.
pub const DEFAULT_CAPACITY: usize = 256;

/// A bounded, interior-mutable cache keyed by hive offset.
pub struct RecordCache<T> {
    inner: RefCell<LruCache<u32, T>>,
}

impl<T: Clone> RecordCache<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        RecordCache {
            inner: RefCell::new(LruCache::new(capacity)),
        }
    }

    /// Returns a cached record for `offset`, if present, promoting it to
    /// most-recently-used.
    pub fn get(&self, offset: u32) -> Option<T> {
        self.inner.borrow_mut().get(&offset).cloned()
    }

    /// Inserts or replaces the cached record for `offset`.
    pub fn insert(&self, offset: u32, value: T) {
        self.inner.borrow_mut().put(offset, value);
    }

    /// Number of records currently cached.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached record.
    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}

impl<T: Clone> Default for RecordCache<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_returns_clone() {
        let cache: RecordCache<String> = RecordCache::with_capacity(4);
        cache.insert(0x10, "nk@0x10".to_string());
        assert_eq!(cache.get(0x10), Some("nk@0x10".to_string()));
    }

    #[test]
    fn miss_returns_none() {
        let cache: RecordCache<String> = RecordCache::with_capacity(4);
        assert_eq!(cache.get(0x99), None);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache: RecordCache<u32> = RecordCache::with_capacity(2);
        cache.insert(1, 100);
        cache.insert(2, 200);
        cache.get(1); // touch 1, making 2 the LRU
        cache.insert(3, 300); // evicts 2
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(1), Some(100));
        assert_eq!(cache.get(3), Some(300));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache: RecordCache<u32> = RecordCache::with_capacity(4);
        cache.insert(1, 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
