//! Bounded embedding cache with lazy TTL expiry and oldest-first eviction
//!
//! Keys are SHA-256 digests of the trimmed, lower-cased text. Lookups take the
//! shared lock and bump per-entry counters atomically; insertion, eviction and
//! expiry removal take the exclusive lock.

use crate::thought::content_hash;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cache key for a piece of text
pub fn cache_key(text: &str) -> String {
    content_hash(&text.trim().to_lowercase())
}

struct CacheEntry {
    vector: Vec<f32>,
    model: String,
    inserted_at: Instant,
    ttl: Duration,
    seq: u64,
    access_count: AtomicU64,
    last_accessed_ms: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion sequence -> key; the first entry is the oldest
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl CacheInner {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }
}

/// A cached vector returned on a hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbedding {
    /// The cached vector
    pub vector: Vec<f32>,
    /// Model that produced it
    pub model: String,
    /// Hits on this entry, including this one
    pub access_count: u64,
}

/// Counters describing cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live entries
    pub size: usize,
    /// Capacity bound
    pub capacity: usize,
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that missed (including expired)
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
}

/// Bounded text-hash → vector cache
pub struct EmbeddingCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    ttl: Duration,
    epoch: Instant,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity,
            ttl,
            epoch: Instant::now(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<CachedEmbedding> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<CachedEmbedding> {
        {
            let inner = self.inner.read();
            match inner.entries.get(key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    let access_count = entry.access_count.fetch_add(1, Ordering::Relaxed) + 1;
                    let since_epoch = now.saturating_duration_since(self.epoch).as_millis() as u64;
                    entry.last_accessed_ms.store(since_epoch, Ordering::Relaxed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(CachedEmbedding {
                        vector: entry.vector.clone(),
                        model: entry.model.clone(),
                        access_count,
                    });
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, another writer may have replaced it
        let mut inner = self.inner.write();
        if inner.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            inner.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = key, "Embedding cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an entry, evicting the oldest entry when full
    pub fn insert(&self, key: impl Into<String>, vector: Vec<f32>, model: impl Into<String>) {
        self.insert_at(key.into(), vector, model.into(), Instant::now());
    }

    pub(crate) fn insert_at(&self, key: String, vector: Vec<f32>, model: String, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.write();
        if inner.remove(&key).is_none() && inner.entries.len() >= self.capacity {
            let oldest = inner.order.iter().next().map(|(_, k)| k.clone());
            if let Some(oldest) = oldest {
                inner.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %oldest, "Evicted oldest embedding cache entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                vector,
                model,
                inserted_at: now,
                ttl: self.ttl,
                seq,
                access_count: AtomicU64::new(0),
                last_accessed_ms: AtomicU64::new(
                    now.saturating_duration_since(self.epoch).as_millis() as u64,
                ),
            },
        );
    }

    /// Whether a live entry exists for the key (does not count as a lookup)
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    /// When the entry was last read (or inserted, if never read)
    pub fn last_accessed(&self, key: &str) -> Option<Instant> {
        self.inner.read().entries.get(key).map(|e| {
            self.epoch + Duration::from_millis(e.last_accessed_ms.load(Ordering::Relaxed))
        })
    }

    /// Remove every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        self.expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    /// Drop all entries
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
