//! Shared test fixtures.

use backsim::domain::bar::Bar;
use backsim::domain::error::BacksimError;
use backsim::domain::strategy::{
    Condition, Direction, IndicatorParams, IndicatorSpec, Operand, Operator, PriceField,
    StrategyDefinition,
};
use backsim::ports::data_port::DataPort;
use chrono::NaiveDate;

pub struct MockDataPort {
    pub bars: Vec<Bar>,
}

impl MockDataPort {
    pub fn with_closes(closes: &[f64]) -> Self {
        Self {
            bars: make_bars(closes),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        _symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacksimError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        Ok(vec!["TEST".into()])
    }
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64 - 1)
}

/// Bars where open == close == the given value, one per weekday-agnostic day.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: "TEST".into(),
            date: date(1) + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: (close - 1.0).max(0.1),
            close,
            volume: 1000,
        })
        .collect()
}

/// Enter long when close > previous close; exit on the inverse.
pub fn momentum_strategy() -> StrategyDefinition {
    StrategyDefinition {
        id: "momentum".into(),
        name: "Momentum".into(),
        direction: Direction::Long,
        indicators: vec![],
        entry: vec![Condition {
            left: Operand::Price {
                field: PriceField::Close,
                offset: 0,
            },
            operator: Operator::Gt,
            right: Operand::Price {
                field: PriceField::Close,
                offset: 1,
            },
        }],
        exit: vec![],
    }
}

/// Enter long when the fast SMA is above the slow SMA.
pub fn sma_cross_strategy(fast: usize, slow: usize) -> StrategyDefinition {
    let sma = |id: &str, period: usize| IndicatorSpec {
        id: id.into(),
        kind: "sma".into(),
        parameters: IndicatorParams {
            period: Some(period),
            multiplier: None,
        },
    };
    let indicator = |id: &str| Operand::Indicator {
        id: id.into(),
        field: Default::default(),
        offset: 0,
    };

    StrategyDefinition {
        id: "sma-cross".into(),
        name: "SMA crossover".into(),
        direction: Direction::Long,
        indicators: vec![sma("fast", fast), sma("slow", slow)],
        entry: vec![Condition {
            left: indicator("fast"),
            operator: Operator::Gt,
            right: indicator("slow"),
        }],
        exit: vec![],
    }
}
