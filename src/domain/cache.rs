//! In-memory bar cache.
//!
//! Keyed by exact (symbol, start, end) request; overlapping ranges are
//! distinct entries. Entries expire after a fixed TTL and expired entries are
//! treated as absent, so a fetch after expiry goes back to the data source.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use super::bar::Bar;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    start: NaiveDate,
    end: NaiveDate,
}

struct CacheEntry {
    bars: Vec<Bar>,
    inserted_at: Instant,
}

/// Thread-safe TTL cache for fetched bar ranges.
pub struct BarCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl BarCache {
    pub fn new(ttl: Duration) -> Self {
        BarCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Option<Vec<Bar>> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            start,
            end,
        };
        let mut entries = self.entries.lock().ok()?;
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.bars.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, symbol: &str, start: NaiveDate, end: NaiveDate, bars: Vec<Bar>) {
        let key = CacheKey {
            symbol: symbol.to_string(),
            start,
            end,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    bars,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BarCache {
    fn default() -> Self {
        BarCache::new(DEFAULT_TTL)
    }
}
