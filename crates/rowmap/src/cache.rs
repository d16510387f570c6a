//! Result and schema caching.
//!
//! The driver consults an injected [`CacheStore`] for query results and
//! introspected column sets, only ever with a caller-supplied positive
//! TTL. The store must tolerate concurrent reads; a stampede (duplicate
//! work under concurrent misses) is accepted since every writer computes
//! the same deterministic result for the same key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rowmap_core::{ColumnInfo, RawRow};

/// One cached payload.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// Raw result rows of a select-like statement.
    Rows(Vec<RawRow>),
    /// Introspected column metadata for one table.
    Columns(Vec<ColumnInfo>),
}

/// Keyed store with per-entry expiry.
pub trait CacheStore {
    /// Fetch a live entry, or `None` when absent or expired.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry for `ttl` seconds. A zero TTL stores nothing.
    fn set(&self, key: &str, entry: CacheEntry, ttl: u64);
}

/// Mutex-guarded in-process store.
///
/// Expired entries are dropped lazily on read, so the map only ever
/// holds keys that have been asked for since they went stale plus the
/// live set.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (CacheEntry, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including any not yet reaped.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let Ok(mut map) = self.entries.lock() else {
            return None;
        };
        match map.get(key) {
            Some((entry, deadline)) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    map.remove(key);
                    None
                } else {
                    Some(entry.clone())
                }
            }
            None => None,
        }
    }

    fn set(&self, key: &str, entry: CacheEntry, ttl: u64) {
        if ttl == 0 {
            return;
        }
        if let Ok(mut map) = self.entries.lock() {
            let deadline = Instant::now().checked_add(Duration::from_secs(ttl));
            map.insert(key.to_string(), (entry, deadline));
        }
    }
}
