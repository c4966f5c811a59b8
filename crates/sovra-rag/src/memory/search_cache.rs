//! Cache of ranked result pages keyed by query signature
//!
//! Every page is stamped with the store generation it was computed under.
//! Writes bump the generation and clear the map, so a page computed
//! concurrently with a write is never served afterwards. A page also goes
//! stale at the first policy validity boundary that could change which
//! records it may contain.

use super::query::SearchResults;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct CachedPage {
    results: SearchResults,
    generation: u64,
    inserted_at: Instant,
    stale_at: Option<DateTime<Utc>>,
}

pub(crate) struct SearchCache {
    pages: DashMap<String, CachedPage>,
    generation: AtomicU64,
    capacity: usize,
    ttl: Duration,
}

impl SearchCache {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            pages: DashMap::new(),
            generation: AtomicU64::new(0),
            capacity,
            ttl,
        }
    }

    /// Generation a search should stamp its page with
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn get(&self, key: &str, now: DateTime<Utc>) -> Option<SearchResults> {
        let current = self.generation();
        match self.pages.get(key) {
            None => return None,
            Some(page)
                if page.generation == current
                    && page.inserted_at.elapsed() < self.ttl
                    && page.stale_at.map_or(true, |at| now < at) =>
            {
                return Some(page.results.clone());
            }
            Some(_) => {}
        }
        self.pages.remove(key);
        None
    }

    pub(crate) fn insert(
        &self,
        key: String,
        results: SearchResults,
        generation: u64,
        stale_at: Option<DateTime<Utc>>,
    ) {
        if self.capacity == 0 || generation != self.generation() {
            return;
        }
        if !self.pages.contains_key(&key) && self.pages.len() >= self.capacity {
            let oldest = self
                .pages
                .iter()
                .min_by_key(|entry| entry.value().inserted_at)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.pages.remove(&oldest);
            }
        }
        self.pages.insert(
            key,
            CachedPage {
                results,
                generation,
                inserted_at: Instant::now(),
                stale_at,
            },
        );
    }

    /// Drop every page; returns how many were dropped
    pub(crate) fn invalidate(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = self.pages.len();
        self.pages.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }
}
