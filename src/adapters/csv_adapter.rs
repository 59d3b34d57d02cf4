//! CSV file data adapter.
//!
//! Reads one `{symbol}.csv` per symbol from a base directory, with a
//! `date,open,high,low,close,volume` header row and ISO dates.

use crate::domain::bar::Bar;
use crate::domain::error::BacksimError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn column<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
    symbol: &str,
) -> Result<&'a str, BacksimError> {
    record.get(index).ok_or_else(|| BacksimError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: format!("missing {} column", name),
    })
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    name: &str,
    symbol: &str,
) -> Result<T, BacksimError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| BacksimError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: format!("invalid {} value '{}': {}", name, value, e),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacksimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| BacksimError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BacksimError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = column(&record, 0, "date", symbol)?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                BacksimError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                open: parse_field(column(&record, 1, "open", symbol)?, "open", symbol)?,
                high: parse_field(column(&record, 2, "high", symbol)?, "high", symbol)?,
                low: parse_field(column(&record, 3, "low", symbol)?, "low", symbol)?,
                close: parse_field(column(&record, 4, "close", symbol)?, "close", symbol)?,
                volume: parse_field(column(&record, 5, "volume", symbol)?, "volume", symbol)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
