//! TTL + LRU cache bounded by total weight.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::CacheStats;
use crate::metrics::CACHE_LOOKUPS;

/// Computes the weight of a value. Defaults to 1 per entry.
pub type Weigher<V> = Arc<dyn Fn(&V) -> u64 + Send + Sync>;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    weight: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

struct Inner<K, V> {
    /// Unbounded by count; `Cache::put` enforces the weight bound.
    entries: LruCache<K, Entry<V>>,
    weight: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.entries.pop(key)?;
        self.weight -= entry.weight;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }

    fn evict_lru(&mut self) -> bool {
        let Some((_, entry)) = self.entries.pop_lru() else {
            return false;
        };
        self.weight -= entry.weight;
        self.stats.evictions += 1;
        true
    }
}

/// A thread-safe keyed store with per-entry TTL and LRU eviction.
///
/// All state lives behind one mutex that is never held across an await.
/// Values are handed out by clone; wrap large values in an `Arc`.
///
/// Two callers racing a get-then-put on the same key both fetch and both
/// write; the last write wins. Cached values are idempotent re-fetches of
/// external data, so this is accepted.
pub struct Cache<K, V> {
    name: String,
    capacity: u64,
    weigher: Weigher<V>,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache where every entry weighs 1, so `capacity` is an entry count.
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self::with_weigher(name, capacity, Arc::new(|_: &V| 1))
    }

    /// Create a cache with a custom weight function.
    pub fn with_weigher(name: impl Into<String>, capacity: u64, weigher: Weigher<V>) -> Self {
        let name = name.into();
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                weight: 0,
                stats: CacheStats {
                    name: name.clone(),
                    capacity,
                    ..Default::default()
                },
            }),
            name,
            capacity,
            weigher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry. Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let result = {
            let mut inner = self.lock();
            let expired = inner.entries.peek(key).map(|entry| entry.is_expired(now));
            match expired {
                None => {
                    inner.stats.misses += 1;
                    None
                }
                Some(true) => {
                    inner.remove(key);
                    inner.stats.expirations += 1;
                    inner.stats.misses += 1;
                    None
                }
                Some(false) => {
                    inner.stats.hits += 1;
                    // Promotes the entry to most recently used.
                    inner.entries.get(key).map(|e| e.value.clone())
                }
            }
        };

        let outcome = if result.is_some() { "hit" } else { "miss" };
        CACHE_LOOKUPS
            .with_label_values(&[self.name.as_str(), outcome])
            .inc();
        result
    }

    /// Insert or replace an entry.
    ///
    /// When the new entry would push the total weight over capacity, expired
    /// entries are purged first and then least-recently-used entries are
    /// evicted until it fits. A value heavier than the whole capacity, or one
    /// with a zero TTL, is not stored (and any previous value for the key is
    /// dropped).
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let weight = (self.weigher)(&value);
        let now = Instant::now();
        let mut inner = self.lock();

        inner.remove(&key);

        if weight > self.capacity || ttl.is_zero() {
            debug!(
                cache = %self.name,
                weight,
                capacity = self.capacity,
                "Value not cacheable, skipping"
            );
            return;
        }

        if inner.weight + weight > self.capacity {
            let purged = inner.purge_expired(now);
            if purged > 0 {
                debug!(cache = %self.name, purged, "Purged expired entries");
            }
        }
        while inner.weight + weight > self.capacity {
            if !inner.evict_lru() {
                break;
            }
        }

        inner.weight += weight;
        inner.stats.insertions += 1;
        inner.entries.put(
            key,
            Entry {
                value,
                inserted_at: now,
                ttl,
                weight,
            },
        );
    }

    /// Drop an entry. Returns whether one was present.
    pub fn invalidate(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.weight = 0;
    }

    /// Remove all expired entries now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    /// Number of entries physically present.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current total weight.
    pub fn weight(&self) -> u64 {
        self.lock().weight
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            weight: inner.weight,
            ..inner.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_stored_value() {
        let cache: Cache<String, u32> = Cache::new("test", 10);
        cache.put("a".to_string(), 1, MINUTE);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let cache: Cache<&str, u32> = Cache::new("test", 10);
        cache.put("a", 1, MINUTE);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"a"), None);
        // Lazily removed on read
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_existing_value() {
        let cache: Cache<&str, u32> = Cache::new("test", 10);
        cache.put("a", 1, MINUTE);
        cache.put("a", 2, MINUTE);

        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.weight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_least_recently_used() {
        let cache: Cache<&str, u32> = Cache::new("test", 3);
        cache.put("a", 1, MINUTE);
        cache.put("b", 2, MINUTE);
        cache.put("c", 3, MINUTE);

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get(&"a").is_some());

        cache.put("d", 4, MINUTE);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_eviction_below_capacity() {
        let cache: Cache<u32, u32> = Cache::new("test", 100);
        for i in 0..100 {
            cache.put(i, i, MINUTE);
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_purges_expired_before_lru() {
        let cache: Cache<&str, u32> = Cache::new("test", 2);
        cache.put("short", 1, Duration::from_secs(10));
        cache.put("long", 2, MINUTE);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put("new", 3, MINUTE);

        // The expired entry made room; the live LRU entry survives
        assert_eq!(cache.get(&"long"), Some(2));
        assert_eq!(cache.get(&"new"), Some(3));
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weighted_capacity() {
        let weigher: Weigher<Vec<u8>> = Arc::new(|v: &Vec<u8>| v.len() as u64);
        let cache: Cache<&str, Vec<u8>> = Cache::with_weigher("bytes", 10, weigher);

        cache.put("a", vec![0; 4], MINUTE);
        cache.put("b", vec![0; 4], MINUTE);
        assert_eq!(cache.weight(), 8);

        // Needs 6 units: evicting the oldest entry is enough
        cache.put("c", vec![0; 6], MINUTE);
        assert_eq!(cache.weight(), 10);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b").map(|v| v.len()), Some(4));
        assert_eq!(cache.get(&"c").map(|v| v.len()), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_value_not_stored() {
        let weigher: Weigher<Vec<u8>> = Arc::new(|v: &Vec<u8>| v.len() as u64);
        let cache: Cache<&str, Vec<u8>> = Cache::with_weigher("bytes", 4, weigher);

        cache.put("a", vec![0; 2], MINUTE);
        cache.put("a", vec![0; 5], MINUTE);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.weight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_not_stored() {
        let cache: Cache<&str, u32> = Cache::new("test", 4);
        cache.put("a", 1, Duration::ZERO);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_and_clear() {
        let cache: Cache<&str, u32> = Cache::new("test", 4);
        cache.put("a", 1, MINUTE);
        cache.put("b", 2, MINUTE);

        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.get(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.weight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache: Cache<u32, u32> = Cache::new("test", 10);
        cache.put(1, 1, Duration::from_secs(5));
        cache.put(2, 2, Duration::from_secs(5));
        cache.put(3, 3, MINUTE);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache: Arc<Cache<u32, u32>> = Arc::new(Cache::new("test", 50));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for i in 0..200u32 {
                        let key = (i + worker) % 80;
                        if cache.get(&key).is_none() {
                            cache.put(key, key * 2, MINUTE);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len() <= 50);
        assert!(cache.weight() <= 50);
        for key in 0..80 {
            if let Some(v) = cache.get(&key) {
                assert_eq!(v, key * 2);
            }
        }
    }
}
