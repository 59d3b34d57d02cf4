//! Simulation settings assembled from configuration.
//!
//! `SimulationSettings` gathers everything tunable about a run from a
//! `ConfigPort` and validates the values once, up front. Missing keys fall
//! back to documented defaults; out-of-range values are config errors, never
//! silently clamped.

use std::time::Duration;

use super::analysis::{DEFAULT_TRIALS, MonteCarloConfig};
use super::cache;
use super::error::BacksimError;
use super::execution::{EquityMode, ExecutionConfig};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub monte_carlo: MonteCarloConfig,
    /// Wall-clock budget for a whole run; `None` means unbounded.
    pub timeout: Option<Duration>,
    pub cache_ttl: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            execution: ExecutionConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            timeout: None,
            cache_ttl: cache::DEFAULT_TTL,
        }
    }
}

impl SimulationSettings {
    /// Read settings from the `[backtest]`, `[execution]`, and `[analysis]`
    /// sections, validating each value.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacksimError> {
        let initial_capital =
            config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
        require_positive("backtest", "initial_capital", initial_capital)?;

        let timeout_secs = config.get_int("backtest", "timeout_secs", 0);
        if timeout_secs < 0 {
            return Err(invalid("backtest", "timeout_secs", "must not be negative"));
        }
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs as u64));

        let cache_ttl_secs = config.get_int(
            "backtest",
            "cache_ttl_secs",
            cache::DEFAULT_TTL.as_secs() as i64,
        );
        if cache_ttl_secs < 0 {
            return Err(invalid("backtest", "cache_ttl_secs", "must not be negative"));
        }

        let execution = execution_from_config(config)?;

        let trials = config.get_int("analysis", "monte_carlo_trials", DEFAULT_TRIALS as i64);
        if trials < 0 {
            return Err(invalid(
                "analysis",
                "monte_carlo_trials",
                "must not be negative",
            ));
        }
        let seed = config.get_int("analysis", "monte_carlo_seed", 0);

        Ok(SimulationSettings {
            initial_capital,
            execution,
            monte_carlo: MonteCarloConfig {
                trials: trials as usize,
                seed: seed as u64,
            },
            timeout,
            cache_ttl: Duration::from_secs(cache_ttl_secs as u64),
        })
    }
}

fn execution_from_config(config: &dyn ConfigPort) -> Result<ExecutionConfig, BacksimError> {
    let defaults = ExecutionConfig::default();

    let commission_per_trade = config.get_double(
        "execution",
        "commission_per_trade",
        defaults.commission_per_trade,
    );
    require_non_negative("execution", "commission_per_trade", commission_per_trade)?;

    let commission_pct = config.get_double("execution", "commission_pct", defaults.commission_pct);
    require_non_negative("execution", "commission_pct", commission_pct)?;

    let slippage_pct = config.get_double("execution", "slippage_pct", defaults.slippage_pct);
    require_non_negative("execution", "slippage_pct", slippage_pct)?;

    let risk_fraction = config.get_double("execution", "risk_fraction", defaults.risk_fraction);
    if !risk_fraction.is_finite() || risk_fraction <= 0.0 || risk_fraction > 1.0 {
        return Err(invalid(
            "execution",
            "risk_fraction",
            "must be in (0, 1]",
        ));
    }

    let equity_mode = match config
        .get_string("execution", "equity_mode")
        .unwrap_or_else(|| "cash_only".to_string())
        .as_str()
    {
        "cash_only" => EquityMode::CashOnly,
        "mark_to_market" => EquityMode::MarkToMarket,
        other => {
            return Err(invalid(
                "execution",
                "equity_mode",
                &format!("unknown mode '{other}', expected cash_only or mark_to_market"),
            ));
        }
    };

    Ok(ExecutionConfig {
        commission_per_trade,
        commission_pct,
        slippage_pct,
        risk_fraction,
        allow_reversal: config.get_bool("execution", "allow_reversal", defaults.allow_reversal),
        allow_shorting: config.get_bool("execution", "allow_shorting", defaults.allow_shorting),
        equity_mode,
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> BacksimError {
    BacksimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(section: &str, key: &str, value: f64) -> Result<(), BacksimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(section, key, "must be a positive number"));
    }
    Ok(())
}

fn require_non_negative(section: &str, key: &str, value: f64) -> Result<(), BacksimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(section, key, "must not be negative"));
    }
    Ok(())
}
