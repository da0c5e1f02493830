//! Sharded in-process price cache with dirty tracking.
//!
//! Keys are spread over independently locked shards so unrelated keys never
//! contend. Each shard keeps its own recency order; eviction prefers clean
//! entries so data written during a store outage stays until it is flushed.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::warn;

use crate::domain::{PriceKey, PriceRecord};

/// Cached shadow of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub record: PriceRecord,
    /// Written while the persistent store was unreachable and not yet flushed.
    pub dirty: bool,
    /// Global write order of dirty entries; zero for clean ones.
    pub dirty_seq: u64,
}

/// One lock's worth of entries, split by dirtiness so eviction never scans.
struct Shard {
    clean: LruCache<PriceKey, CacheEntry>,
    dirty: LruCache<PriceKey, CacheEntry>,
}

impl Shard {
    fn new() -> Self {
        Self {
            clean: LruCache::unbounded(),
            dirty: LruCache::unbounded(),
        }
    }

    fn len(&self) -> usize {
        self.clean.len() + self.dirty.len()
    }

    fn get(&mut self, key: &PriceKey) -> Option<&CacheEntry> {
        if self.clean.contains(key) {
            self.clean.get(key)
        } else {
            self.dirty.get(key)
        }
    }

    fn peek(&self, key: &PriceKey) -> Option<&CacheEntry> {
        self.clean.peek(key).or_else(|| self.dirty.peek(key))
    }

    fn insert(&mut self, key: PriceKey, entry: CacheEntry) {
        if entry.dirty {
            self.clean.pop(&key);
            self.dirty.put(key, entry);
        } else {
            self.dirty.pop(&key);
            self.clean.put(key, entry);
        }
    }

    /// Drop the least recently used clean entry, or a dirty one if none is clean.
    fn evict(&mut self) {
        if self.clean.pop_lru().is_some() {
            return;
        }
        if let Some((key, _)) = self.dirty.pop_lru() {
            warn!(item = %key, "Evicting unflushed cache entry");
        }
    }

    fn clear(&mut self) {
        self.clean.clear();
        self.dirty.clear();
    }
}

/// Bounded, sharded LRU cache of resolved prices.
pub struct MemoryCache {
    shards: Box<[Mutex<Shard>]>,
    shard_capacity: usize,
    hasher: RandomState,
    next_dirty_seq: AtomicU64,
}

impl MemoryCache {
    /// Create a cache holding about `capacity` entries across `shards` buckets.
    #[must_use]
    pub fn new(capacity: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        let shard_capacity = capacity.div_ceil(shards).max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(Shard::new())).collect(),
            shard_capacity,
            hasher: RandomState::new(),
            next_dirty_seq: AtomicU64::new(1),
        }
    }

    fn shard(&self, key: &PriceKey) -> &Mutex<Shard> {
        let index = (self.hasher.hash_one(key) % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Look up a key and mark it most recently used.
    #[must_use]
    pub fn get(&self, key: &PriceKey) -> Option<CacheEntry> {
        self.shard(key).lock().get(key).cloned()
    }

    /// Look up a key without touching recency.
    #[must_use]
    pub fn peek(&self, key: &PriceKey) -> Option<CacheEntry> {
        self.shard(key).lock().peek(key).cloned()
    }

    /// Insert or replace an entry, evicting if the shard overflows.
    pub fn put(&self, record: PriceRecord, dirty: bool) {
        let dirty_seq = if dirty {
            self.next_dirty_seq.fetch_add(1, Ordering::Relaxed)
        } else {
            0
        };
        let key = record.key.clone();
        let mut shard = self.shard(&key).lock();
        shard.insert(
            key,
            CacheEntry {
                record,
                dirty,
                dirty_seq,
            },
        );
        while shard.len() > self.shard_capacity {
            shard.evict();
        }
    }

    /// Dirty entries in the order they were written.
    #[must_use]
    pub fn dirty_entries(&self) -> Vec<CacheEntry> {
        let mut dirty: Vec<CacheEntry> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .dirty
                    .iter()
                    .map(|(_, entry)| entry.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        dirty.sort_by_key(|entry| entry.dirty_seq);
        dirty
    }

    /// Replace a flushed dirty entry with its persisted record.
    ///
    /// Does nothing (and returns false) if the entry was evicted or rewritten
    /// since `dirty_seq` was observed.
    pub fn mark_clean(&self, key: &PriceKey, dirty_seq: u64, persisted: PriceRecord) -> bool {
        let mut shard = self.shard(key).lock();
        if shard.dirty.peek(key).map(|entry| entry.dirty_seq) != Some(dirty_seq) {
            return false;
        }
        shard.dirty.pop(key);
        shard.clean.put(
            key.clone(),
            CacheEntry {
                record: persisted,
                dirty: false,
                dirty_seq: 0,
            },
        );
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().dirty.len()).sum()
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }
}
