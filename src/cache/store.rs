//! Expiring record store.
//!
//! A bounded LRU map whose entries expire a fixed interval after insertion.
//! Every operation runs under one mutex, so readers never observe a
//! half-written entry and eviction never races a concurrent insert.

use std::{sync::Mutex, time::Duration};

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT_TOTAL: &str = "apod_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "apod_cache_miss_total";
pub const METRIC_CACHE_EVICT_TOTAL: &str = "apod_cache_evict_total";
pub const METRIC_CACHE_EXPIRED_TOTAL: &str = "apod_cache_expired_total";

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Bounded key/value store with a process-wide time-to-live.
///
/// Expired entries are treated as absent on read and purged lazily. When an
/// insert of a new key finds the store full, expired entries are purged
/// first; if that frees nothing, the least-recently-used entry is evicted.
/// Callers always receive clones, never references into the store.
pub struct ExpiringCache<V> {
    ttl: Duration,
    entries: Mutex<LruCache<CacheKey, Entry<V>>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn capacity(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "capacity").cap().get()
    }

    /// Look up `namespace:id`, returning the value only if it has not expired.
    pub fn get(&self, namespace: &'static str, id: &str) -> Option<V> {
        self.get_key(&CacheKey::new(namespace, id))
    }

    pub fn get_key(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");

        let lookup = entries
            .get(key)
            .map(|entry| entry.is_fresh(now, self.ttl).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                Some(value)
            }
            Some(None) => {
                entries.pop(key);
                counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(1);
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                debug!(key = %key, "dropped expired cache entry");
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert or overwrite `namespace:id`, stamping the current time.
    pub fn set(&self, namespace: &'static str, id: &str, value: V) {
        self.set_key(CacheKey::new(namespace, id), value);
    }

    pub fn set_key(&self, key: CacheKey, value: V) {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");

        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            self.purge_expired(&mut entries, now);
        }

        let entry = Entry {
            value,
            inserted_at: now,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
            debug!(evicted = %evicted, inserted = %key, "evicted least recently used entry");
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    /// Number of physically stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self, entries: &mut LruCache<CacheKey, Entry<V>>, now: Instant) {
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            let purged = expired.len() as u64;
            counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(purged);
        }
    }
}
