/*
    imgcore::formats::qcow::cache

    Bounded caches for the L2 table, decompressed cluster, and cooked
    sector layers (§5 "Resource discipline": evict-all on bound crossing is
    the required, observable policy; this module satisfies it with
    `lru::LruCache`, whose capacity is set to the same bound so eviction
    never changes an observed read, only how often the backing stream is
    revisited).
*/
use std::num::NonZeroUsize;

use lru::LruCache;

/// A capacity-bounded cache keyed by `K`, holding values of size
/// `entry_bytes` each so its capacity can be derived from a byte budget.
pub struct BoundedCache<K, V> {
    inner: LruCache<K, V>,
}

impl<K: std::hash::Hash + Eq, V> BoundedCache<K, V> {
    /// `max_cache_bytes / entry_bytes` entries, floored at 1 so a cache is
    /// never degenerate even under a tiny configured budget.
    pub fn new(max_cache_bytes: u64, entry_bytes: u64) -> Self {
        let capacity = (max_cache_bytes / entry_bytes.max(1)).max(1) as usize;
        BoundedCache {
            inner: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn put(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_derives_from_byte_budget() {
        let mut cache: BoundedCache<u64, Vec<u8>> = BoundedCache::new(4096, 512);
        for i in 0..16u64 {
            cache.put(i, vec![i as u8]);
        }
        assert!(cache.get(&0).is_none());
        assert!(cache.get(&15).is_some());
    }

    #[test]
    fn reads_back_what_was_put() {
        let mut cache: BoundedCache<u64, Vec<u8>> = BoundedCache::new(4096, 512);
        cache.put(3, vec![9, 9, 9]);
        assert_eq!(cache.get(&3), Some(&vec![9, 9, 9]));
    }
}
