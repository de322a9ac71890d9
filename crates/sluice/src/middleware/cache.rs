//! Result cache
//!
//! Results are keyed by statement text plus bound parameters. A hit returns
//! a clone of the stored value without invoking the wrapped operation, so it
//! uses no connection, transaction or retry budget.
//!
//! Concurrent misses on the same key are single-flighted: one caller computes
//! while the others wait and then read its result. Failed computations are
//! not cached.

use dashmap::DashMap;
use parking_lot::Mutex;
use sluice_core::{observe, CacheConfig, CacheKey, Query, Result, Row};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Cache of materialized result sets.
pub type ResultCache = QueryCache<Vec<Row>>;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

/// Process-wide or caller-owned cache of query results.
pub struct QueryCache<V = Vec<Row>> {
    entries: DashMap<CacheKey, Entry<V>>,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    // Insertion order for FIFO eviction; only maintained when bounded.
    order: Mutex<VecDeque<(CacheKey, u64)>>,
    config: CacheConfig,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time view of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache<Vec<Row>> {
    /// The process-wide result cache. Unbounded and never expiring.
    pub fn global() -> &'static ResultCache {
        static GLOBAL: OnceLock<ResultCache> = OnceLock::new();
        GLOBAL.get_or_init(ResultCache::new)
    }
}

impl<V: Clone> QueryCache<V> {
    /// An unbounded cache without expiry.
    pub fn new() -> Self {
        Self::build(CacheConfig::unbounded())
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            config,
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry without computing anything.
    pub fn get(&self, query: &Query) -> Option<V> {
        self.lookup(&query.cache_key())
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        let expired_seq = {
            let entry = self.entries.get(key)?;
            match self.config.ttl() {
                Some(ttl) if entry.inserted_at.elapsed() >= ttl => entry.seq,
                _ => return Some(entry.value.clone()),
            }
        };
        // The read guard is released above; removing under it would deadlock.
        self.entries.remove_if(key, |_, e| e.seq == expired_seq);
        None
    }

    /// Return the cached result for `query`, computing and storing it on a
    /// miss.
    pub fn get_or_compute<F>(&self, query: &Query, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let key = query.cache_key();
        if let Some(value) = self.lookup(&key) {
            return Ok(self.hit(&key, value));
        }

        let flight = self.in_flight.entry(key.clone()).or_default().clone();
        let result = {
            let _leader = flight.lock();
            // Another caller may have filled the entry while we waited.
            match self.lookup(&key) {
                Some(value) => Ok(self.hit(&key, value)),
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    observe::record_cache_lookup(false);
                    tracing::debug!(sql = %key.sql(), "Cache miss");
                    compute().map(|value| {
                        self.insert(key.clone(), value.clone());
                        value
                    })
                }
            }
        };
        // Only the map and this handle remain once nobody else is waiting.
        self.in_flight
            .remove_if(&key, |_, f| Arc::ptr_eq(f, &flight) && Arc::strong_count(f) <= 2);
        result
    }

    fn hit(&self, key: &CacheKey, value: V) -> V {
        self.hits.fetch_add(1, Ordering::Relaxed);
        observe::record_cache_lookup(true);
        tracing::trace!(sql = %key.sql(), "Cache hit");
        value
    }

    fn insert(&self, key: CacheKey, value: V) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if let Some(max) = self.config.max_entries {
            let mut order = self.order.lock();
            order.push_back((key.clone(), seq));
            self.entries.insert(
                key,
                Entry {
                    value,
                    inserted_at: Instant::now(),
                    seq,
                },
            );
            while self.entries.len() > max {
                let Some((oldest, oldest_seq)) = order.pop_front() else {
                    break;
                };
                if self
                    .entries
                    .remove_if(&oldest, |_, e| e.seq == oldest_seq)
                    .is_some()
                {
                    tracing::debug!(sql = %oldest.sql(), "Evicted cache entry");
                }
            }
            // Invalidated and expired entries leave stale markers behind.
            if order.len() > max.saturating_mul(2) {
                order.retain(|(key, seq)| {
                    self.entries
                        .get(key)
                        .is_some_and(|entry| entry.seq == *seq)
                });
            }
        } else {
            self.entries.insert(
                key,
                Entry {
                    value,
                    inserted_at: Instant::now(),
                    seq,
                },
            );
        }
        observe::set_cache_size(self.entries.len());
    }

    /// Wrap `op` so its result is cached under `query`.
    pub fn wrap<'a, F>(&'a self, query: Query, mut op: F) -> impl FnMut() -> Result<V> + 'a
    where
        F: FnMut() -> Result<V> + 'a,
    {
        move || self.get_or_compute(&query, &mut op)
    }

    /// Drop the entry for `query`. Returns whether one was present.
    pub fn invalidate(&self, query: &Query) -> bool {
        let removed = self.entries.remove(&query.cache_key()).is_some();
        if removed {
            tracing::debug!(sql = %query.sql(), "Invalidated cache entry");
            observe::set_cache_size(self.entries.len());
        }
        removed
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut order = self.order.lock();
        let dropped = self.entries.len();
        self.entries.clear();
        order.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        observe::set_cache_size(0);
        tracing::info!(entries = dropped, "Result cache cleared");
    }

    /// Stored entries, including expired ones not yet purged by a lookup.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}
