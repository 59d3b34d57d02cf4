//! Backtest orchestration.
//!
//! `run_backtest` drives the full pipeline for one symbol and one strategy:
//! fetch, integrity check, strategy compilation, signal evaluation, fill
//! simulation, then metrics and Monte Carlo. Stage order matters: every
//! validation failure surfaces before a single fill is simulated, and the
//! cancel token is polled between stages and inside the long loops.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::analysis::{self, MonteCarloSummary, PerformanceMetrics};
use super::bar;
use super::cancel::CancelToken;
use super::config::SimulationSettings;
use super::error::BacksimError;
use super::execution::{self, EquityMode, EquityPoint, Trade};
use super::signal;
use super::strategy::StrategyDefinition;
use super::validation;
use crate::ports::data_port::DataPort;

/// Fill policy identifier recorded in run metadata.
pub const FILL_POLICY: &str = "next_bar_open";

#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategy: StrategyDefinition,
}

/// Reproducibility record attached to every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub symbol: String,
    pub strategy_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bars: usize,
    pub initial_capital: f64,
    pub fill_policy: String,
    pub equity_mode: EquityMode,
    pub skipped_entries: usize,
    pub monte_carlo_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: PerformanceMetrics,
    pub monte_carlo: MonteCarloSummary,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metadata: RunMetadata,
}

/// Run a complete backtest for one request.
pub fn run_backtest(
    data: &dyn DataPort,
    request: &BacktestRequest,
    settings: &SimulationSettings,
    cancel: &CancelToken,
) -> Result<BacktestResult, BacksimError> {
    if request.start_date > request.end_date {
        return Err(BacksimError::DataUnavailable {
            symbol: request.symbol.clone(),
            reason: format!(
                "start date {} is after end date {}",
                request.start_date, request.end_date
            ),
        });
    }

    cancel.check("fetch")?;
    let bars = data.fetch_bars(&request.symbol, request.start_date, request.end_date)?;
    if bars.is_empty() {
        return Err(BacksimError::DataUnavailable {
            symbol: request.symbol.clone(),
            reason: format!(
                "no bars between {} and {}",
                request.start_date, request.end_date
            ),
        });
    }
    bar::validate_bars(&bars)?;

    cancel.check("strategy compilation")?;
    let compiled = validation::compile_strategy(&request.strategy, &bars)?;

    cancel.check("signal evaluation")?;
    let signals = signal::evaluate_signals(&compiled, &bars);

    let simulation = execution::simulate(
        &bars,
        &signals,
        settings.initial_capital,
        &settings.execution,
        cancel,
    )?;

    cancel.check("analysis")?;
    let metrics = analysis::compute_metrics(&simulation.equity_curve, &simulation.trades);
    let monte_carlo = analysis::monte_carlo(&simulation.trades, &settings.monte_carlo, cancel)?;

    Ok(BacktestResult {
        metrics,
        monte_carlo,
        metadata: RunMetadata {
            symbol: request.symbol.clone(),
            strategy_id: request.strategy.id.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            bars: bars.len(),
            initial_capital: settings.initial_capital,
            fill_policy: FILL_POLICY.to_string(),
            equity_mode: simulation.equity_mode,
            skipped_entries: simulation.skipped_entries,
            monte_carlo_seed: settings.monte_carlo.seed,
        },
        trades: simulation.trades,
        equity_curve: simulation.equity_curve,
    })
}
