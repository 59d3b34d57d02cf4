//! Data access port trait.

use crate::domain::bar::Bar;
use crate::domain::error::BacksimError;
use chrono::NaiveDate;

pub trait DataPort: Sync {
    /// Fetch daily bars for `symbol` within the inclusive date range, sorted
    /// ascending by date.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacksimError>;

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError>;
}
