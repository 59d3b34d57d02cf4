//! Caching wrapper over any data port.
//!
//! Serves repeated (symbol, start, end) fetches from a `BarCache` instead of
//! the underlying source. Errors are never cached.

use crate::domain::bar::Bar;
use crate::domain::cache::BarCache;
use crate::domain::error::BacksimError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::time::Duration;

pub struct CachedDataAdapter<D: DataPort> {
    inner: D,
    cache: BarCache,
}

impl<D: DataPort> CachedDataAdapter<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            cache: BarCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &BarCache {
        &self.cache
    }
}

impl<D: DataPort> DataPort for CachedDataAdapter<D> {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacksimError> {
        if let Some(bars) = self.cache.get(symbol, start_date, end_date) {
            return Ok(bars);
        }

        let bars = self.inner.fetch_bars(symbol, start_date, end_date)?;
        self.cache.insert(symbol, start_date, end_date, bars.clone());
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        self.inner.list_symbols()
    }
}
