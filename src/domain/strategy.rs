//! Declarative strategy definitions.
//!
//! A `StrategyDefinition` is the serialized form callers submit: a list of
//! named indicator specs plus entry/exit condition sets. Conditions compare
//! two operands — an indicator reference, a raw price field, or a constant —
//! with one of the five comparison operators. Direction is a declared field
//! on the strategy, never inferred from the conditions.
//!
//! Example JSON:
//!
//! ```json
//! {
//!   "id": "sma-cross",
//!   "name": "SMA crossover",
//!   "direction": "long",
//!   "indicators": [
//!     { "id": "fast", "type": "sma", "parameters": { "period": 10 } },
//!     { "id": "slow", "type": "sma", "parameters": { "period": 30 } }
//!   ],
//!   "entry": [
//!     { "left": { "indicator": { "id": "fast" } },
//!       "operator": "gt",
//!       "right": { "indicator": { "id": "slow" } } }
//!   ],
//!   "exit": []
//! }
//! ```
//!
//! An empty `exit` set means exit on the inverse of the entry condition.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub indicators: Vec<IndicatorSpec>,
    pub entry: Vec<Condition>,
    #[serde(default)]
    pub exit: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: IndicatorParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<usize>,
    /// Standard-deviation multiplier for bollinger bands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    pub operator: Operator,
    pub right: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
}

/// One side of a condition. `offset` looks strictly backward: an operand at
/// bar `i` with `offset = 1` reads the value at bar `i - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Indicator {
        id: String,
        #[serde(default)]
        field: IndicatorField,
        #[serde(default)]
        offset: usize,
    },
    Price {
        field: PriceField,
        #[serde(default)]
        offset: usize,
    },
    Constant {
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorField {
    #[default]
    Value,
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}
