//! Client-side response cache.
//!
//! A bounded, TTL-based store of backend responses keyed by
//! `<resource>:<canonical params>` (see [`CacheKey`]). Values are opaque JSON;
//! [`ResponseCache::get_as`] and [`ResponseCache::set_json`] give typed access.
//!
//! # Policy
//!
//! - An entry is valid while `now < expires_at`; an entry whose TTL overflows
//!   the clock never expires
//! - Expired entries are dropped lazily on read and by
//!   [`ResponseCache::evict_expired`], which `get` also runs with a
//!   configurable probability
//! - Inserting a new key into a full cache evicts the least recently accessed
//!   entries first
//! - The cache never fails: a poisoned lock or a value that does not
//!   (de)serialize is treated as a miss
//!
//! The cache is cheap to clone; clones share the same entries.

mod clock;
mod inflight;
mod key;

pub use clock::{Clock, ManualClock, SystemClock};
pub use inflight::InFlight;
pub use key::{CacheKey, KeyPattern, ORDER_AUDIT, ORDER_DETAIL, ORDER_LIST};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Current number of entries.
    pub size: usize,
}

impl CacheStats {
    /// Hits as a percentage of all lookups, `0.0` before the first lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// Snapshot of one entry, for debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    pub age: Duration,
    pub idle: Duration,
    pub size: usize,
    pub is_expired: bool,
}

/// Snapshot of the whole cache, for debugging.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub stats: CacheStats,
    pub hit_ratio: f64,
    /// Entries ordered from least to most recently accessed.
    pub entries: Vec<EntryInfo>,
    /// Sum of approximate entry sizes in bytes.
    pub total_size: usize,
}

struct CacheEntry {
    value: Value,
    created_at: Instant,
    last_access: Instant,
    /// Access sequence number; lower means less recently used.
    access_seq: u64,
    /// `None` when the TTL overflows the clock.
    expires_at: Option<Instant>,
    size: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn touch(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
        }
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        self.evictions += removed as u64;
        removed
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_seq)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
            debug!(key, "Evicted least recently used cache entry");
        }
    }
}

struct CacheInner {
    max_entries: usize,
    default_ttl: Duration,
    sweep_probability: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

/// Bounded TTL + LRU response cache.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    /// Create a cache on the system clock.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on the given clock.
    #[must_use]
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                max_entries: config.max_entries,
                default_ttl: config.default_ttl,
                sweep_probability: config.sweep_probability.clamp(0.0, 1.0),
                clock,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    fn state(&self) -> Option<MutexGuard<'_, CacheState>> {
        match self.inner.state.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("Cache lock poisoned, treating as miss");
                None
            }
        }
    }

    fn should_sweep(&self) -> bool {
        let p = self.inner.sweep_probability;
        p > 0.0 && rand::rng().random_bool(p)
    }

    // =========================================================================
    // Core operations
    // =========================================================================

    /// Look up a valid entry, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<Value> {
        let sweep = self.should_sweep();
        let now = self.inner.clock.now();
        let mut state = self.state()?;

        if sweep {
            state.evict_expired(now);
        }

        match state.entries.get(key).map(|entry| entry.is_expired(now)) {
            None => {
                state.misses += 1;
                debug!(key, "Cache miss");
                return None;
            }
            Some(true) => {
                state.entries.remove(key);
                state.evictions += 1;
                state.misses += 1;
                debug!(key, "Cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        let seq = state.touch();
        state.hits += 1;
        let entry = state.entries.get_mut(key)?;
        // Recency is refreshed on read, expiry is not
        entry.last_access = now;
        entry.access_seq = seq;
        debug!(key, "Cache hit");
        Some(entry.value.clone())
    }

    /// Store a value, using the default TTL when `ttl` is `None`.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let max = self.inner.max_entries;
        if max == 0 {
            return;
        }

        let now = self.inner.clock.now();
        let ttl = ttl.unwrap_or(self.inner.default_ttl);
        let size = value.to_string().len();
        let Some(mut state) = self.state() else {
            return;
        };

        if !state.entries.contains_key(key) {
            while state.entries.len() >= max {
                state.evict_lru();
            }
        }

        let seq = state.touch();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                last_access: now,
                access_seq: seq,
                expires_at: now.checked_add(ttl),
                size,
            },
        );
    }

    /// Delete one entry, returning whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.state()
            .is_some_and(|mut state| state.entries.remove(key).is_some())
    }

    /// Delete every entry the pattern selects, returning how many were removed.
    pub fn invalidate_by_pattern(&self, pattern: &KeyPattern) -> usize {
        let Some(mut state) = self.state() else {
            return 0;
        };
        let before = state.entries.len();
        state.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(?pattern, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.inner.clock.now();
        self.state().map_or(0, |mut state| state.evict_expired(now))
    }

    /// Drop every entry; cleared entries count as evictions.
    pub fn clear(&self) {
        if let Some(mut state) = self.state() {
            state.evictions += state.entries.len() as u64;
            state.entries.clear();
        }
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// Look up and deserialize an entry.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Serialize and store a value.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl),
            Err(e) => warn!(key, error = %e, "Value not cacheable"),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state().map(|state| state.stats()).unwrap_or_default()
    }

    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        self.stats().hit_ratio()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stats().size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a valid entry exists, without touching stats or recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = self.inner.clock.now();
        self.state().is_some_and(|state| {
            state
                .entries
                .get(key)
                .is_some_and(|entry| !entry.is_expired(now))
        })
    }

    /// Debug snapshot of stats and entries.
    #[must_use]
    pub fn info(&self) -> CacheInfo {
        let now = self.inner.clock.now();
        let Some(state) = self.state() else {
            return CacheInfo {
                stats: CacheStats::default(),
                hit_ratio: 0.0,
                entries: Vec::new(),
                total_size: 0,
            };
        };

        let mut ordered: Vec<(&String, &CacheEntry)> = state.entries.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.access_seq);

        let entries: Vec<EntryInfo> = ordered
            .into_iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                age: now.saturating_duration_since(entry.created_at),
                idle: now.saturating_duration_since(entry.last_access),
                size: entry.size,
                is_expired: entry.is_expired(now),
            })
            .collect();
        let stats = state.stats();

        CacheInfo {
            stats,
            hit_ratio: stats.hit_ratio(),
            total_size: entries.iter().map(|e| e.size).sum(),
            entries,
        }
    }
}
