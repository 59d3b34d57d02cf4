//! OHLCV bar representation and input-series integrity checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::BacksimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Validate the bar series before any computation runs.
///
/// Checks: dates strictly increasing (no duplicates, no reordering),
/// `high >= max(open, close, low)`, `low <= min(open, close, high)`,
/// non-negative volume, finite prices.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BacksimError> {
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(BacksimError::DataIntegrity {
                index: i,
                reason: format!(
                    "date {} is not after previous date {}",
                    bar.date,
                    bars[i - 1].date
                ),
            });
        }

        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if !value.is_finite() {
                return Err(BacksimError::DataIntegrity {
                    index: i,
                    reason: format!("{name} is not finite"),
                });
            }
        }

        if bar.high < bar.open.max(bar.close).max(bar.low) {
            return Err(BacksimError::DataIntegrity {
                index: i,
                reason: format!("high {} below open/close/low", bar.high),
            });
        }

        if bar.low > bar.open.min(bar.close).min(bar.high) {
            return Err(BacksimError::DataIntegrity {
                index: i,
                reason: format!("low {} above open/close/high", bar.low),
            });
        }

        if bar.volume < 0 {
            return Err(BacksimError::DataIntegrity {
                index: i,
                reason: format!("negative volume {}", bar.volume),
            });
        }
    }

    Ok(())
}
