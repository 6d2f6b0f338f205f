//! Bounded TTL cache for analysis results
//!
//! Entries expire lazily on read. When an insert pushes the map past its
//! capacity, the entry with the oldest write time is evicted (insertion
//! order, not access order).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;

/// A cached analysis payload
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub model_used: String,
    pub analysis: serde_json::Value,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedAnalysis,
    stored_at: DateTime<Utc>,
    /// Monotonic write counter, breaks ties between equal timestamps
    seq: u64,
}

impl CacheEntry {
    fn is_stale(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.stored_at) >= ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// Result cache shared by every concurrent `analyze` call
///
/// Every operation takes the single inner lock for its whole duration.
pub struct ResultCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: config.capacity.max(1),
            ttl: TimeDelta::from_std(config.ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a fresh entry, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<CachedAnalysis> {
        let now = self.clock.now();
        let mut state = self.lock();

        let stale = match state.entries.get(key) {
            Some(entry) if !entry.is_stale(now, self.ttl) => {
                debug!(key, "Cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            debug!(key, "Cache entry expired");
            state.entries.remove(key);
        }
        None
    }

    /// Store a value, evicting the oldest write if over capacity
    pub fn put(&self, key: &str, value: CachedAnalysis) {
        let now = self.clock.now();
        let mut state = self.lock();

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                seq,
            },
        );

        if state.entries.len() > self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.stored_at, entry.seq))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "Evicting oldest cache entry");
                state.entries.remove(&oldest);
            }
        }
    }

    /// Remove every entry whose key starts with `prefix`, returning how many
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        before - state.entries.len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
