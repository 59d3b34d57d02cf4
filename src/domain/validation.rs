//! Strategy validation and compilation.
//!
//! All strategy errors are caught here, before any simulation runs:
//! unknown indicator kinds, malformed parameters, and unresolved indicator
//! references. References are resolved once into direct slot indices so
//! evaluation never performs a by-name lookup, and every indicator slot is
//! computed up front (independent slots in parallel).

use rayon::prelude::*;

use super::bar::Bar;
use super::error::BacksimError;
use super::indicator::{self, IndicatorKind, IndicatorSeries};
use super::strategy::{
    Condition, Direction, IndicatorField, Operator, Operand, PriceField, StrategyDefinition,
};

/// A strategy with every reference resolved and every indicator computed.
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    pub direction: Direction,
    pub entry: Vec<CompiledCondition>,
    pub exit: Vec<CompiledCondition>,
    pub slots: Vec<IndicatorSeries>,
}

#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub left: CompiledOperand,
    pub operator: Operator,
    pub right: CompiledOperand,
}

#[derive(Debug, Clone)]
pub enum CompiledOperand {
    Indicator {
        slot: usize,
        field: IndicatorField,
        offset: usize,
    },
    Price {
        field: PriceField,
        offset: usize,
    },
    Constant(f64),
}

/// Check a definition without a bar series: indicator kinds, parameters,
/// and references. Data-dependent checks (warm-up vs series length) only
/// happen in `compile_strategy`.
pub fn validate_definition(definition: &StrategyDefinition) -> Result<(), BacksimError> {
    compile_static(definition).map(|_| ())
}

/// Validate a strategy definition against the bar series and compile it.
pub fn compile_strategy(
    definition: &StrategyDefinition,
    bars: &[Bar],
) -> Result<CompiledStrategy, BacksimError> {
    let (kinds, entry, exit) = compile_static(definition)?;

    // Independent slots; order of completion does not matter, output order
    // follows the definition's indicator list.
    let slots: Vec<IndicatorSeries> = kinds
        .par_iter()
        .map(|kind| indicator::compute(kind, bars))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledStrategy {
        direction: definition.direction,
        entry,
        exit,
        slots,
    })
}

type StaticParts = (
    Vec<IndicatorKind>,
    Vec<CompiledCondition>,
    Vec<CompiledCondition>,
);

fn compile_static(definition: &StrategyDefinition) -> Result<StaticParts, BacksimError> {
    let mut kinds = Vec::with_capacity(definition.indicators.len());
    let mut ids: Vec<&str> = Vec::with_capacity(definition.indicators.len());

    for spec in &definition.indicators {
        if ids.contains(&spec.id.as_str()) {
            return Err(BacksimError::InvalidStrategy {
                reason: format!("duplicate indicator id '{}'", spec.id),
            });
        }
        kinds.push(resolve_kind(&spec.kind, spec)?);
        ids.push(&spec.id);
    }

    let entry = compile_conditions(&definition.entry, &ids, &kinds)?;
    let exit = compile_conditions(&definition.exit, &ids, &kinds)?;

    if entry.is_empty() {
        return Err(BacksimError::InvalidStrategy {
            reason: "strategy has no entry conditions".into(),
        });
    }

    Ok((kinds, entry, exit))
}

fn resolve_kind(
    kind: &str,
    spec: &crate::domain::strategy::IndicatorSpec,
) -> Result<IndicatorKind, BacksimError> {
    let period = || {
        spec.parameters.period.filter(|&p| p > 0).ok_or_else(|| {
            BacksimError::InvalidStrategy {
                reason: format!(
                    "indicator '{}' ({kind}) requires a positive period parameter",
                    spec.id
                ),
            }
        })
    };

    match kind {
        "sma" => Ok(IndicatorKind::Sma(period()?)),
        "ema" => Ok(IndicatorKind::Ema(period()?)),
        "rsi" => Ok(IndicatorKind::Rsi(period()?)),
        "bollinger" => {
            let multiplier = spec.parameters.multiplier.unwrap_or(2.0);
            if !multiplier.is_finite() || multiplier <= 0.0 {
                return Err(BacksimError::InvalidStrategy {
                    reason: format!(
                        "indicator '{}' has invalid multiplier {multiplier}",
                        spec.id
                    ),
                });
            }
            Ok(IndicatorKind::Bollinger {
                period: period()?,
                stddev_mult_x100: (multiplier * 100.0).round() as u32,
            })
        }
        "obv" => Ok(IndicatorKind::Obv),
        other => Err(BacksimError::InvalidStrategy {
            reason: format!("unknown indicator type '{other}' for '{}'", spec.id),
        }),
    }
}

fn compile_conditions(
    conditions: &[Condition],
    ids: &[&str],
    kinds: &[IndicatorKind],
) -> Result<Vec<CompiledCondition>, BacksimError> {
    conditions
        .iter()
        .map(|c| {
            Ok(CompiledCondition {
                left: compile_operand(&c.left, ids, kinds)?,
                operator: c.operator,
                right: compile_operand(&c.right, ids, kinds)?,
            })
        })
        .collect()
}

fn compile_operand(
    operand: &Operand,
    ids: &[&str],
    kinds: &[IndicatorKind],
) -> Result<CompiledOperand, BacksimError> {
    match operand {
        Operand::Indicator { id, field, offset } => {
            let slot = ids.iter().position(|known| known == id).ok_or_else(|| {
                BacksimError::InvalidStrategy {
                    reason: format!("unresolved indicator reference '{id}'"),
                }
            })?;

            let is_band = matches!(kinds[slot], IndicatorKind::Bollinger { .. });
            let field_is_band = !matches!(field, IndicatorField::Value);
            if field_is_band && !is_band {
                return Err(BacksimError::InvalidStrategy {
                    reason: format!(
                        "indicator '{id}' ({}) has no band field",
                        kinds[slot]
                    ),
                });
            }
            if is_band && !field_is_band {
                return Err(BacksimError::InvalidStrategy {
                    reason: format!(
                        "indicator '{id}' is bollinger; pick field upper, middle, or lower"
                    ),
                });
            }

            Ok(CompiledOperand::Indicator {
                slot,
                field: *field,
                offset: *offset,
            })
        }
        Operand::Price { field, offset } => Ok(CompiledOperand::Price {
            field: *field,
            offset: *offset,
        }),
        Operand::Constant { value } => {
            if !value.is_finite() {
                return Err(BacksimError::InvalidStrategy {
                    reason: format!("non-finite constant operand {value}"),
                });
            }
            Ok(CompiledOperand::Constant(*value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{IndicatorParams, IndicatorSpec};
    use chrono::NaiveDate;

    fn make_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000,
            })
            .collect()
    }

    fn spec(id: &str, kind: &str, period: Option<usize>) -> IndicatorSpec {
        IndicatorSpec {
            id: id.into(),
            kind: kind.into(),
            parameters: IndicatorParams {
                period,
                multiplier: None,
            },
        }
    }

    fn indicator_operand(id: &str) -> Operand {
        Operand::Indicator {
            id: id.into(),
            field: IndicatorField::Value,
            offset: 0,
        }
    }

    fn base_definition() -> StrategyDefinition {
        StrategyDefinition {
            id: "test".into(),
            name: "Test".into(),
            direction: Direction::Long,
            indicators: vec![spec("fast", "sma", Some(3)), spec("slow", "sma", Some(5))],
            entry: vec![Condition {
                left: indicator_operand("fast"),
                operator: Operator::Gt,
                right: indicator_operand("slow"),
            }],
            exit: vec![],
        }
    }

    #[test]
    fn compiles_valid_strategy() {
        let compiled = compile_strategy(&base_definition(), &make_bars(30)).unwrap();
        assert_eq!(compiled.slots.len(), 2);
        assert_eq!(compiled.entry.len(), 1);
        assert!(compiled.exit.is_empty());

        match (&compiled.entry[0].left, &compiled.entry[0].right) {
            (
                CompiledOperand::Indicator { slot: 0, .. },
                CompiledOperand::Indicator { slot: 1, .. },
            ) => {}
            other => panic!("refs not resolved to slots: {other:?}"),
        }
    }

    #[test]
    fn rejects_unresolved_reference() {
        let mut def = base_definition();
        def.entry[0].right = indicator_operand("missing");

        let err = compile_strategy(&def, &make_bars(30)).unwrap_err();
        assert!(matches!(err, BacksimError::InvalidStrategy { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn rejects_unknown_indicator_type() {
        let mut def = base_definition();
        def.indicators.push(spec("x", "vwap", Some(10)));

        let err = compile_strategy(&def, &make_bars(30)).unwrap_err();
        assert!(err.to_string().contains("vwap"));
    }

    #[test]
    fn rejects_missing_period() {
        let mut def = base_definition();
        def.indicators[0] = spec("fast", "sma", None);
        assert!(compile_strategy(&def, &make_bars(30)).is_err());
    }

    #[test]
    fn rejects_duplicate_indicator_id() {
        let mut def = base_definition();
        def.indicators.push(spec("fast", "ema", Some(4)));
        let err = compile_strategy(&def, &make_bars(30)).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_empty_entry_set() {
        let mut def = base_definition();
        def.entry.clear();
        assert!(compile_strategy(&def, &make_bars(30)).is_err());
    }

    #[test]
    fn insufficient_bars_fail_before_simulation() {
        let err = compile_strategy(&base_definition(), &make_bars(4)).unwrap_err();
        assert!(matches!(
            err,
            BacksimError::InsufficientData {
                bars: 4,
                required: 5
            }
        ));
    }

    #[test]
    fn band_field_requires_bollinger() {
        let mut def = base_definition();
        def.entry[0].left = Operand::Indicator {
            id: "fast".into(),
            field: IndicatorField::Upper,
            offset: 0,
        };
        let err = compile_strategy(&def, &make_bars(30)).unwrap_err();
        assert!(err.to_string().contains("band field"));
    }

    #[test]
    fn bollinger_requires_band_field() {
        let mut def = base_definition();
        def.indicators.push(IndicatorSpec {
            id: "bands".into(),
            kind: "bollinger".into(),
            parameters: IndicatorParams {
                period: Some(5),
                multiplier: Some(2.0),
            },
        });
        def.entry[0].left = indicator_operand("bands");
        assert!(compile_strategy(&def, &make_bars(30)).is_err());

        def.entry[0].left = Operand::Indicator {
            id: "bands".into(),
            field: IndicatorField::Lower,
            offset: 0,
        };
        assert!(compile_strategy(&def, &make_bars(30)).is_ok());
    }

    #[test]
    fn validate_definition_needs_no_bars() {
        assert!(validate_definition(&base_definition()).is_ok());

        let mut def = base_definition();
        def.entry[0].right = indicator_operand("missing");
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_non_finite_constant() {
        let mut def = base_definition();
        def.entry[0].right = Operand::Constant { value: f64::NAN };
        assert!(compile_strategy(&def, &make_bars(30)).is_err());
    }
}
