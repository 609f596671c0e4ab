//! Sharded, charge-bounded LRU cache.
//!
//! Keys are byte strings. Each entry carries a caller-chosen `charge` (bytes,
//! file handles, whatever the caller is budgeting) and a shard evicts its
//! least-recently-used entries once the summed charge exceeds its share of the
//! capacity. Values are handed out as `Arc<V>`, so an evicted value stays
//! usable by whoever still holds it.
//!
//! Shards are chosen by the top bits of `xxh64(key)` and each one sits behind
//! its own mutex, so unrelated keys rarely contend.

use crate::error::{Error, Result};
use loam_observe::{CacheEvt, CacheKind, Meter, NoopMeter, VizEvent};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of shard bits (16 shards).
pub const DEFAULT_SHARD_BITS: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total charge the cache may hold across all shards.
    pub capacity: usize,
    /// log2 of the shard count (default: 4).
    pub shard_bits: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 8 * 1024 * 1024,
            shard_bits: DEFAULT_SHARD_BITS,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shard_bits > 16 {
            return Err(Error::InvalidConfig(format!(
                "cache shard_bits ({}) must be <= 16",
                self.shard_bits
            )));
        }
        Ok(())
    }
}

struct CacheEntry<V> {
    value: Arc<V>,
    charge: usize,
}

struct Shard<V> {
    entries: LruCache<Vec<u8>, CacheEntry<V>>,
    usage: usize,
    capacity: usize,
}

impl<V> Shard<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            usage: 0,
            capacity,
        }
    }

    /// Inserts and returns the total charge evicted to make room.
    fn insert(&mut self, key: &[u8], value: Arc<V>, charge: usize) -> usize {
        if let Some(old) = self.entries.put(key.to_vec(), CacheEntry { value, charge }) {
            self.usage -= old.charge;
        }
        self.usage += charge;

        let mut evicted = 0;
        while self.usage > self.capacity {
            match self.entries.pop_lru() {
                Some((_, entry)) => {
                    self.usage -= entry.charge;
                    evicted += entry.charge;
                }
                None => break,
            }
        }
        evicted
    }

    fn lookup(&mut self, key: &[u8]) -> Option<Arc<V>> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn erase(&mut self, key: &[u8]) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.usage -= entry.charge;
                true
            }
            None => false,
        }
    }

    fn prune(&mut self) {
        self.entries.clear();
        self.usage = 0;
    }
}

/// Cache split into independently locked LRU shards.
pub struct ShardedLruCache<V> {
    shards: Vec<Mutex<Shard<V>>>,
    shard_bits: u8,
    last_id: AtomicU64,
    meter: Arc<dyn Meter>,
}

impl<V> ShardedLruCache<V> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::new_with_meter(config, Arc::new(NoopMeter))
    }

    pub fn new_with_meter(config: CacheConfig, meter: Arc<dyn Meter>) -> Result<Self> {
        config.validate()?;
        let num_shards = 1usize << config.shard_bits;
        let per_shard = config.capacity.div_ceil(num_shards);
        let shards = (0..num_shards)
            .map(|_| Mutex::new(Shard::new(per_shard)))
            .collect();
        Ok(Self {
            shards,
            shard_bits: config.shard_bits,
            last_id: AtomicU64::new(0),
            meter,
        })
    }

    /// Inserts `value` under `key`, replacing any previous entry, and returns
    /// a handle to the stored value.
    pub fn insert(&self, key: &[u8], value: V, charge: usize) -> Arc<V> {
        let value = Arc::new(value);
        let shard = self.shard_index(key);
        let evicted = self.shards[shard].lock().insert(key, value.clone(), charge);
        if evicted > 0 {
            tracing::trace!(shard, evicted, "cache eviction");
            self.meter.emit(VizEvent::Cache(CacheEvt {
                shard: shard as u32,
                kind: CacheKind::Evicted { charge: evicted },
            }));
        }
        value
    }

    /// Returns the cached value and marks it most recently used.
    pub fn lookup(&self, key: &[u8]) -> Option<Arc<V>> {
        let found = self.shards[self.shard_index(key)].lock().lookup(key);
        if found.is_some() {
            self.meter
                .counter("cache_lookups", &[("outcome", "hit")])
                .inc(1);
        } else {
            self.meter
                .counter("cache_lookups", &[("outcome", "miss")])
                .inc(1);
        }
        found
    }

    /// Removes `key`. Outstanding handles to its value remain valid.
    pub fn erase(&self, key: &[u8]) -> bool {
        self.shards[self.shard_index(key)].lock().erase(key)
    }

    /// Drops every entry.
    pub fn prune(&self) {
        for shard in &self.shards {
            shard.lock().prune();
        }
    }

    /// Returns a new id, unique for this cache instance.
    ///
    /// Clients sharing one cache prefix their keys with it to keep their key
    /// spaces apart.
    pub fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sum of the charges of all resident entries.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|s| s.lock().usage).sum()
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        if self.shard_bits == 0 {
            return 0;
        }
        let hash = xxhash_rust::xxh64::xxh64(key, 0);
        (hash >> (64 - self.shard_bits as u32)) as usize
    }
}
