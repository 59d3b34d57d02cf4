//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorValue`: enum for the different indicator output shapes
//! - `IndicatorKind`: closed registry of indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values, aligned 1:1 with
//!   the bar series it was computed from
//!
//! Warm-up points carry `valid = false`; they are never silently zero.

pub mod bollinger;
pub mod ema;
pub mod obv;
pub mod rsi;
pub mod sma;

use chrono::NaiveDate;
use std::fmt;

use super::bar::Bar;
use super::error::BacksimError;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

/// Closed tagged-variant registry of computable indicators.
///
/// Strategy definitions name these by string kind; validation resolves the
/// name into a variant once, so evaluation never dispatches dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Obv,
}

impl IndicatorKind {
    /// Number of leading bars before the first valid point.
    pub fn warm_up(&self) -> usize {
        match self {
            IndicatorKind::Sma(period)
            | IndicatorKind::Ema(period)
            | IndicatorKind::Bollinger { period, .. } => period.saturating_sub(1),
            // RSI needs `period` price changes, so period bars of warm-up.
            IndicatorKind::Rsi(period) => *period,
            IndicatorKind::Obv => 0,
        }
    }

    /// Minimum number of bars for at least one valid point.
    pub fn min_bars(&self) -> usize {
        self.warm_up() + 1
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub values: Vec<IndicatorPoint>,
}

/// Compute one indicator series over the bar sequence.
///
/// A period longer than the available series is refused up front rather than
/// producing an all-invalid series.
pub fn compute(kind: &IndicatorKind, bars: &[Bar]) -> Result<IndicatorSeries, BacksimError> {
    if kind.min_bars() > bars.len() {
        return Err(BacksimError::InsufficientData {
            bars: bars.len(),
            required: kind.min_bars(),
        });
    }

    let series = match kind {
        IndicatorKind::Sma(period) => sma::calculate_sma(bars, *period),
        IndicatorKind::Ema(period) => ema::calculate_ema(bars, *period),
        IndicatorKind::Rsi(period) => rsi::calculate_rsi(bars, *period),
        IndicatorKind::Bollinger {
            period,
            stddev_mult_x100,
        } => bollinger::calculate_bollinger(bars, *period, *stddev_mult_x100),
        IndicatorKind::Obv => obv::calculate_obv(bars),
    };

    Ok(series)
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma(period) => write!(f, "SMA({})", period),
            IndicatorKind::Ema(period) => write!(f, "EMA({})", period),
            IndicatorKind::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorKind::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorKind::Obv => write!(f, "OBV"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn kind_display() {
        assert_eq!(IndicatorKind::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorKind::Rsi(14).to_string(), "RSI(14)");
        assert_eq!(IndicatorKind::Obv.to_string(), "OBV");
        assert_eq!(
            IndicatorKind::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
            .to_string(),
            "BOLLINGER(20,2)"
        );
    }

    #[test]
    fn warm_up_lengths() {
        assert_eq!(IndicatorKind::Sma(20).warm_up(), 19);
        assert_eq!(IndicatorKind::Ema(10).warm_up(), 9);
        assert_eq!(IndicatorKind::Rsi(14).warm_up(), 14);
        assert_eq!(IndicatorKind::Obv.warm_up(), 0);
    }

    #[test]
    fn compute_refuses_period_longer_than_series() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let err = compute(&IndicatorKind::Sma(5), &bars).unwrap_err();
        assert!(matches!(
            err,
            BacksimError::InsufficientData {
                bars: 3,
                required: 5
            }
        ));
    }

    #[test]
    fn compute_dispatches_by_kind() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let sma = compute(&IndicatorKind::Sma(3), &bars).unwrap();
        assert_eq!(sma.values.len(), 5);
        assert_eq!(sma.kind, IndicatorKind::Sma(3));

        let obv = compute(&IndicatorKind::Obv, &bars).unwrap();
        assert!(obv.values[0].valid);
    }

    #[test]
    fn kind_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorKind::Sma(20), "fast");
        map.insert(IndicatorKind::Sma(50), "slow");
        assert_eq!(map.get(&IndicatorKind::Sma(20)), Some(&"fast"));
        assert_eq!(map.get(&IndicatorKind::Sma(50)), Some(&"slow"));
    }
}
