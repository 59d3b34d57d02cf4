//! Per-bar signal evaluation.
//!
//! Turns a compiled strategy into one `Signal` per bar. Conditions only read
//! values at indices <= the current bar; a condition touching a still-invalid
//! indicator point (or an offset reaching before the first bar) is false,
//! never an error mid-run.
//!
//! Entry is the AND of all entry conditions. Exit is the AND of the exit set
//! when one is declared, otherwise the inverse of the entry condition. The
//! evaluator tracks the would-be position state so tie-breaks are already
//! encoded in the stream: while flat a simultaneous entry+exit resolves to
//! the entry, while positioned exit takes priority over any new entry.

use super::bar::Bar;
use super::strategy::{Direction, IndicatorField, Operator, PriceField};
use super::validation::{CompiledCondition, CompiledOperand, CompiledStrategy};
use crate::domain::indicator::IndicatorValue;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

/// Evaluate the strategy over the whole series, one signal per bar.
pub fn evaluate_signals(strategy: &CompiledStrategy, bars: &[Bar]) -> Vec<Signal> {
    let mut signals = Vec::with_capacity(bars.len());
    let mut in_position = false;

    let enter = match strategy.direction {
        Direction::Long => Signal::EnterLong,
        Direction::Short => Signal::EnterShort,
    };

    for i in 0..bars.len() {
        let entry = all_true(&strategy.entry, strategy, bars, i);

        let signal = if !in_position {
            if entry {
                in_position = true;
                enter
            } else {
                Signal::Hold
            }
        } else {
            let exit = if strategy.exit.is_empty() {
                !entry
            } else {
                all_true(&strategy.exit, strategy, bars, i)
            };
            if exit {
                in_position = false;
                Signal::Exit
            } else {
                Signal::Hold
            }
        };

        signals.push(signal);
    }

    signals
}

fn all_true(
    conditions: &[CompiledCondition],
    strategy: &CompiledStrategy,
    bars: &[Bar],
    index: usize,
) -> bool {
    conditions
        .iter()
        .all(|c| evaluate_condition(c, strategy, bars, index))
}

fn evaluate_condition(
    condition: &CompiledCondition,
    strategy: &CompiledStrategy,
    bars: &[Bar],
    index: usize,
) -> bool {
    let (Some(left), Some(right)) = (
        resolve_operand(&condition.left, strategy, bars, index),
        resolve_operand(&condition.right, strategy, bars, index),
    ) else {
        // Not ready: warm-up or an offset before the series start.
        return false;
    };

    match condition.operator {
        Operator::Gt => left > right,
        Operator::Lt => left < right,
        Operator::Eq => (left - right).abs() < EPSILON,
        Operator::Gte => left >= right,
        Operator::Lte => left <= right,
    }
}

fn resolve_operand(
    operand: &CompiledOperand,
    strategy: &CompiledStrategy,
    bars: &[Bar],
    index: usize,
) -> Option<f64> {
    match operand {
        CompiledOperand::Constant(v) => Some(*v),
        CompiledOperand::Price { field, offset } => {
            let i = index.checked_sub(*offset)?;
            let bar = &bars[i];
            Some(match field {
                PriceField::Open => bar.open,
                PriceField::High => bar.high,
                PriceField::Low => bar.low,
                PriceField::Close => bar.close,
                PriceField::Volume => bar.volume as f64,
            })
        }
        CompiledOperand::Indicator {
            slot,
            field,
            offset,
        } => {
            let i = index.checked_sub(*offset)?;
            let point = &strategy.slots[*slot].values[i];
            if !point.valid {
                return None;
            }
            match (&point.value, field) {
                (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
                (IndicatorValue::Bollinger { upper, .. }, IndicatorField::Upper) => Some(*upper),
                (IndicatorValue::Bollinger { middle, .. }, IndicatorField::Middle) => Some(*middle),
                (IndicatorValue::Bollinger { lower, .. }, IndicatorField::Lower) => Some(*lower),
                // Field mismatches are rejected at compile time.
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{
        Condition, IndicatorParams, IndicatorSpec, Operand, StrategyDefinition,
    };
    use crate::domain::validation::compile_strategy;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn close_operand(offset: usize) -> Operand {
        Operand::Price {
            field: PriceField::Close,
            offset,
        }
    }

    /// Enter long when close > previous close, exit on the inverse.
    fn momentum_definition() -> StrategyDefinition {
        StrategyDefinition {
            id: "momentum".into(),
            name: "Momentum".into(),
            direction: Direction::Long,
            indicators: vec![],
            entry: vec![Condition {
                left: close_operand(0),
                operator: Operator::Gt,
                right: close_operand(1),
            }],
            exit: vec![],
        }
    }

    fn sma_definition(period: usize) -> StrategyDefinition {
        StrategyDefinition {
            id: "sma".into(),
            name: "SMA".into(),
            direction: Direction::Long,
            indicators: vec![IndicatorSpec {
                id: "sma".into(),
                kind: "sma".into(),
                parameters: IndicatorParams {
                    period: Some(period),
                    multiplier: None,
                },
            }],
            entry: vec![Condition {
                left: close_operand(0),
                operator: Operator::Gt,
                right: Operand::Indicator {
                    id: "sma".into(),
                    field: IndicatorField::Value,
                    offset: 0,
                },
            }],
            exit: vec![],
        }
    }

    #[test]
    fn one_signal_per_bar() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 11.0, 10.0]);
        let compiled = compile_strategy(&momentum_definition(), &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);
        assert_eq!(signals.len(), bars.len());
    }

    #[test]
    fn momentum_signal_sequence() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 11.0, 10.0]);
        let compiled = compile_strategy(&momentum_definition(), &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);

        // Bar 0: no previous close, condition not ready -> hold.
        // Bar 1: rising -> enter; bars 2: still rising, already in -> hold.
        // Bar 3: falling -> inverse exit; bar 4: flat and falling -> hold.
        assert_eq!(
            signals,
            vec![
                Signal::Hold,
                Signal::EnterLong,
                Signal::Hold,
                Signal::Exit,
                Signal::Hold,
            ]
        );
    }

    #[test]
    fn short_direction_emits_enter_short() {
        let mut def = momentum_definition();
        def.direction = Direction::Short;
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let compiled = compile_strategy(&def, &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);
        assert_eq!(signals[1], Signal::EnterShort);
    }

    #[test]
    fn no_entry_during_warmup() {
        // Close always above SMA(3) once it exists; entry must wait for it.
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let compiled = compile_strategy(&sma_definition(3), &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);

        assert_eq!(signals[0], Signal::Hold);
        assert_eq!(signals[1], Signal::Hold);
        assert_eq!(signals[2], Signal::EnterLong);
    }

    #[test]
    fn explicit_exit_set_takes_priority_over_inverse() {
        // Entry: close > 10. Exit: close > 13. Without the explicit exit set
        // the strategy would exit as soon as close <= 10.
        let def = StrategyDefinition {
            id: "explicit-exit".into(),
            name: "Explicit exit".into(),
            direction: Direction::Long,
            indicators: vec![],
            entry: vec![Condition {
                left: close_operand(0),
                operator: Operator::Gt,
                right: Operand::Constant { value: 10.0 },
            }],
            exit: vec![Condition {
                left: close_operand(0),
                operator: Operator::Gt,
                right: Operand::Constant { value: 13.0 },
            }],
        };

        let bars = make_bars(&[9.0, 11.0, 12.0, 14.0, 12.0]);
        let compiled = compile_strategy(&def, &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);

        assert_eq!(
            signals,
            vec![
                Signal::Hold,
                Signal::EnterLong,
                Signal::Hold,
                Signal::Exit,
                Signal::EnterLong,
            ]
        );
    }

    #[test]
    fn entry_wins_while_flat() {
        // Entry and (inverse) exit can never both be true, so use an explicit
        // always-true exit. While flat the entry still wins.
        let def = StrategyDefinition {
            id: "tie".into(),
            name: "Tie".into(),
            direction: Direction::Long,
            indicators: vec![],
            entry: vec![Condition {
                left: close_operand(0),
                operator: Operator::Gt,
                right: Operand::Constant { value: 0.0 },
            }],
            exit: vec![Condition {
                left: Operand::Constant { value: 1.0 },
                operator: Operator::Gt,
                right: Operand::Constant { value: 0.0 },
            }],
        };

        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let compiled = compile_strategy(&def, &bars).unwrap();
        let signals = evaluate_signals(&compiled, &bars);

        // Flat at bar 0: entry wins. In position at bar 1: exit takes
        // priority over re-entry. Flat again at bar 2: entry wins.
        assert_eq!(
            signals,
            vec![Signal::EnterLong, Signal::Exit, Signal::EnterLong]
        );
    }

    #[test]
    fn operator_semantics() {
        let cases = [
            (Operator::Gt, 2.0, 1.0, true),
            (Operator::Gt, 1.0, 1.0, false),
            (Operator::Gte, 1.0, 1.0, true),
            (Operator::Lt, 1.0, 2.0, true),
            (Operator::Lte, 2.0, 2.0, true),
            (Operator::Eq, 1.0, 1.0, true),
            (Operator::Eq, 1.0, 1.1, false),
        ];

        for (operator, left, right, expected) in cases {
            let def = StrategyDefinition {
                id: "op".into(),
                name: "Op".into(),
                direction: Direction::Long,
                indicators: vec![],
                entry: vec![Condition {
                    left: Operand::Constant { value: left },
                    operator,
                    right: Operand::Constant { value: right },
                }],
                exit: vec![],
            };
            let bars = make_bars(&[10.0]);
            let compiled = compile_strategy(&def, &bars).unwrap();
            let signals = evaluate_signals(&compiled, &bars);
            let entered = signals[0] == Signal::EnterLong;
            assert_eq!(entered, expected, "{operator:?} {left} {right}");
        }
    }
}
