//! Bounded in-memory cache with stale-while-revalidate semantics.
//!
//! Entries are fresh for a TTL, then servable-but-stale for an extended
//! window. While an entry is stale, the first caller to win
//! [`SwrCache::claim_revalidation`] refreshes it in the background;
//! everyone else keeps getting the stale value without blocking. Eviction
//! is LRU within byte and entry caps.

mod key;

pub use key::CacheKey;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache sizing and freshness configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on the sum of entry costs, in bytes.
    pub max_bytes: usize,
    pub max_entries: usize,
    /// Window during which a hit is served as fresh.
    pub fresh_ttl: Duration,
    /// Additional window during which a hit is served stale.
    pub stale_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            max_entries: 1000,
            fresh_ttl: Duration::from_secs(5 * 60),
            stale_window: Duration::from_secs(30 * 60),
        }
    }
}

struct Entry<V> {
    value: V,
    cost: usize,
    inserted_at: Instant,
    last_used: Instant,
    revalidating: Arc<AtomicBool>,
}

/// A successful lookup.
pub struct CacheHit<V> {
    pub value: V,
    /// Past the fresh window but within the stale window.
    pub stale: bool,
    /// Time since the entry was stored.
    pub age: Duration,
}

/// Process-wide SWR cache. All operations are internally synchronized.
pub struct SwrCache<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    total_bytes: usize,
}

impl<V: Clone> SwrCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                total_bytes: 0,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Look up a key. Expired entries (past the stale window) are removed
    /// and reported as a miss.
    pub fn lookup(&self, key: &str) -> Option<CacheHit<V>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let max_age = self.config.fresh_ttl + self.config.stale_window;
        let expired = inner
            .entries
            .get(key)
            .map(|e| now.duration_since(e.inserted_at) > max_age)?;
        if expired {
            if let Some(entry) = inner.entries.remove(key) {
                inner.total_bytes -= entry.cost;
            }
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.last_used = now;
        let age = now.duration_since(entry.inserted_at);
        Some(CacheHit {
            value: entry.value.clone(),
            stale: age > self.config.fresh_ttl,
            age,
        })
    }

    /// Atomically claim the right to revalidate a stale entry.
    ///
    /// Returns `true` to exactly one caller per staleness period; the
    /// claim is released when a new value is stored under the key. Claims
    /// on missing keys succeed so a racing eviction cannot strand the
    /// refresh.
    pub fn claim_revalidation(&self, key: &str) -> bool {
        let flag = {
            let inner = self.inner.lock();
            match inner.entries.get(key) {
                Some(entry) => Arc::clone(&entry.revalidating),
                None => return true,
            }
        };
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Insert or replace an entry. `cost` is the entry's byte weight used
    /// for eviction accounting. Oversized values are ignored.
    pub fn store(&self, key: impl Into<String>, value: V, cost: usize) {
        if cost > self.config.max_bytes {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.total_bytes -= old.cost;
        }
        inner.entries.insert(
            key,
            Entry {
                value,
                cost,
                inserted_at: now,
                last_used: now,
                revalidating: Arc::new(AtomicBool::new(false)),
            },
        );
        inner.total_bytes += cost;

        self.evict_locked(&mut inner);
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    fn evict_locked(&self, inner: &mut Inner<V>) {
        while inner.entries.len() > self.config.max_entries
            || inner.total_bytes > self.config.max_bytes
        {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    if let Some(entry) = inner.entries.remove(&k) {
                        inner.total_bytes -= entry.cost;
                        debug!(key = %k, "evicted LRU cache entry");
                    }
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_cache(fresh_ms: u64, stale_ms: u64) -> SwrCache<String> {
        SwrCache::new(CacheConfig {
            max_bytes: 10_000,
            max_entries: 3,
            fresh_ttl: Duration::from_millis(fresh_ms),
            stale_window: Duration::from_millis(stale_ms),
        })
    }

    #[test]
    fn fresh_hit_then_stale_then_miss() {
        let cache = tiny_cache(30, 30);
        cache.store("k", "v".to_string(), 1);

        let hit = cache.lookup("k").unwrap();
        assert!(!hit.stale);
        assert_eq!(hit.value, "v");

        std::thread::sleep(Duration::from_millis(40));
        let hit = cache.lookup("k").unwrap();
        assert!(hit.stale);

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.lookup("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn claim_revalidation_is_single_flight() {
        let cache = tiny_cache(0, 1000);
        cache.store("k", "v".to_string(), 1);

        assert!(cache.claim_revalidation("k"));
        assert!(!cache.claim_revalidation("k"));
        assert!(!cache.claim_revalidation("k"));

        // Storing a fresh value releases the claim.
        cache.store("k", "v2".to_string(), 2);
        assert!(cache.claim_revalidation("k"));
    }

    #[test]
    fn claim_on_concurrent_readers_admits_exactly_one() {
        let cache = Arc::new(tiny_cache(0, 1000));
        cache.store("k", "v".to_string(), 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || cache.claim_revalidation("k")));
        }
        let winners: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn evicts_least_recently_used_past_entry_cap() {
        let cache = tiny_cache(1000, 1000);
        cache.store("a", "1".to_string(), 1);
        cache.store("b", "2".to_string(), 1);
        cache.store("c", "3".to_string(), 1);

        // Touch "a" so "b" is the LRU victim.
        std::thread::sleep(Duration::from_millis(5));
        cache.lookup("a");
        cache.store("d", "4".to_string(), 1);

        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("b").is_none());
        assert!(cache.lookup("d").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn evicts_by_byte_budget() {
        let cache = SwrCache::new(CacheConfig {
            max_bytes: 100,
            max_entries: 100,
            fresh_ttl: Duration::from_secs(60),
            stale_window: Duration::from_secs(60),
        });
        cache.store("a", "x".to_string(), 60);
        std::thread::sleep(Duration::from_millis(5));
        cache.store("b", "y".to_string(), 60);

        assert!(cache.lookup("a").is_none());
        assert!(cache.lookup("b").is_some());
        assert!(cache.total_bytes() <= 100);
    }

    #[test]
    fn oversize_values_are_not_stored() {
        let cache = SwrCache::new(CacheConfig {
            max_bytes: 10,
            max_entries: 10,
            fresh_ttl: Duration::from_secs(60),
            stale_window: Duration::from_secs(60),
        });
        cache.store("a", "x".to_string(), 1000);
        assert!(cache.lookup("a").is_none());
    }
}
