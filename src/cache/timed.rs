//! In-memory key/value cache with a fixed time-to-live
//!
//! Every entry remembers when it was written. A read is only considered fresh
//! while `now - written_at_millis < ttl`; expired entries are never swept and
//! stay in the map until they are overwritten or the cache is cleared.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;

/// Default time-to-live for cached collections (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// A cached value and the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// When the value was written, in Unix milliseconds
    pub written_at_millis: i64,
}

/// Read-only view of the cache contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries, fresh or expired
    pub size: usize,
    /// Cached keys in sorted order
    pub keys: Vec<String>,
    /// Length of all cached values serialized as JSON.
    ///
    /// This is an estimate of the payload size, not of memory usage.
    pub approximate_bytes: usize,
}

/// Map from string keys to timestamped values
pub struct TimedCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
}

impl<V> TimedCache<V> {
    /// Creates an empty cache. The TTL is fixed for the cache's lifetime.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Returns the configured time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.max(0) as u64)
    }

    /// True iff an entry exists for `key` and it was written less than one TTL ago
    ///
    /// An entry stamped in the future (clock skew between runs) is not valid.
    pub fn is_valid(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                let age = self.clock.now_millis().saturating_sub(entry.written_at_millis);
                (0..self.ttl_millis).contains(&age)
            }
            None => false,
        }
    }

    /// Returns the stored value for `key`, whether or not it is still fresh.
    ///
    /// Callers are expected to check `is_valid` first when freshness matters.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Returns the stored value only while it is fresh
    pub fn get_fresh(&self, key: &str) -> Option<&V> {
        if self.is_valid(key) {
            self.get(key)
        } else {
            None
        }
    }

    /// Replaces the entry for `key`, stamping it with the current time
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            written_at_millis: self.clock.now_millis(),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entries, used when persisting the cache between runs
    pub fn entries(&self) -> &HashMap<String, CacheEntry<V>> {
        &self.entries
    }

    /// Replaces all entries, keeping their original write timestamps
    pub fn restore(&mut self, entries: HashMap<String, CacheEntry<V>>) {
        self.entries = entries;
    }
}

impl<V: Serialize> TimedCache<V> {
    /// Summarises the cache contents
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();

        let values: Vec<&V> = self.entries.values().map(|entry| &entry.value).collect();
        let approximate_bytes = serde_json::to_vec(&values)
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        CacheStats {
            size: self.entries.len(),
            keys,
            approximate_bytes,
        }
    }
}

impl<V> std::fmt::Debug for TimedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("TimedCache")
            .field("keys", &keys)
            .field("ttl_millis", &self.ttl_millis)
            .finish()
    }
}
