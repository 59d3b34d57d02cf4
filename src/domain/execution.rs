//! Trade execution and fill simulation.
//!
//! A state machine over `Flat`, `Long`, `Short` consuming one signal per bar.
//! At most one position is open at a time (no pyramiding).
//!
//! Fill policy: a signal produced from bar i's close fills at bar i+1's open,
//! so no fill ever uses information from its own bar. A position still open
//! on the final bar is force-closed at that bar's close and flagged.
//!
//! Accounting: the cash balance starts at `initial_capital` and moves only
//! when a trade closes (realized PnL, costs included). The default equity
//! curve is that cash balance sampled at every bar close; mark-to-market mode
//! adds the open position's unrealized PnL.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::cancel::CancelToken;
use super::error::BacksimError;
use super::signal::Signal;
use super::strategy::Direction;

/// Configuration for execution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    /// Fraction of the cash balance committed per entry.
    pub risk_fraction: f64,
    pub allow_reversal: bool,
    pub allow_shorting: bool,
    pub equity_mode: EquityMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            risk_fraction: 1.0,
            allow_reversal: false,
            allow_shorting: true,
            equity_mode: EquityMode::CashOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityMode {
    CashOnly,
    MarkToMarket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub direction: Direction,
    pub quantity: i64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub entry_commission: f64,
    pub exit_commission: f64,
    pub pnl: Option<f64>,
    pub forced_close: bool,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.exit_date.is_some()
    }

    /// Total execution costs booked against this trade so far.
    pub fn costs(&self) -> f64 {
        self.entry_commission + self.exit_commission
    }

    /// Fractional return on the entry notional, for closed trades.
    pub fn trade_return(&self) -> Option<f64> {
        let pnl = self.pnl?;
        let notional = self.entry_price * self.quantity as f64;
        if notional > 0.0 {
            Some(pnl / notional)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Result of a simulation run: the trade log and equity curve.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Entry signals dropped because sizing produced zero quantity.
    pub skipped_entries: usize,
    pub equity_mode: EquityMode,
}

/// Calculate commission: flat fee + (trade value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Entry slips against the trade direction; exit slips the other way.
pub fn apply_slippage_entry(market_price: f64, slippage_pct: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Long => market_price * (1.0 + slippage_pct / 100.0),
        Direction::Short => market_price * (1.0 - slippage_pct / 100.0),
    }
}

pub fn apply_slippage_exit(market_price: f64, slippage_pct: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Long => market_price * (1.0 - slippage_pct / 100.0),
        Direction::Short => market_price * (1.0 + slippage_pct / 100.0),
    }
}

#[derive(Debug, Clone)]
struct OpenPosition {
    trade_id: u64,
    direction: Direction,
    quantity: i64,
    entry_date: NaiveDate,
    entry_price: f64,
    entry_commission: f64,
}

impl OpenPosition {
    fn unrealized_pnl(&self, price: f64) -> f64 {
        let dir = match self.direction {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        };
        (price - self.entry_price) * self.quantity as f64 * dir
    }
}

struct Simulator<'a> {
    config: &'a ExecutionConfig,
    cash: f64,
    open: Option<OpenPosition>,
    trades: Vec<Trade>,
    skipped_entries: usize,
    next_id: u64,
}

impl<'a> Simulator<'a> {
    fn new(initial_capital: f64, config: &'a ExecutionConfig) -> Self {
        Simulator {
            config,
            cash: initial_capital,
            open: None,
            trades: Vec::new(),
            skipped_entries: 0,
            next_id: 1,
        }
    }

    /// Open a position at the given fill price. Zero-quantity sizing drops
    /// the entry rather than erroring.
    fn enter(&mut self, direction: Direction, fill_price: f64, date: NaiveDate) {
        let entry_price = apply_slippage_entry(fill_price, self.config.slippage_pct, direction);
        let available = self.cash * self.config.risk_fraction;
        let quantity = (available / entry_price).floor() as i64;

        if quantity <= 0 {
            self.skipped_entries += 1;
            return;
        }

        let entry_commission = calculate_commission(quantity as f64 * entry_price, self.config);

        self.open = Some(OpenPosition {
            trade_id: self.next_id,
            direction,
            quantity,
            entry_date: date,
            entry_price,
            entry_commission,
        });
        self.next_id += 1;
    }

    /// Close the open position at the given fill price, realizing PnL into
    /// the cash balance.
    fn close(&mut self, fill_price: f64, date: NaiveDate, forced: bool) {
        let Some(position) = self.open.take() else {
            return;
        };

        let exit_price =
            apply_slippage_exit(fill_price, self.config.slippage_pct, position.direction);
        let exit_commission =
            calculate_commission(position.quantity as f64 * exit_price, self.config);

        let pnl = position.unrealized_pnl(exit_price) - position.entry_commission - exit_commission;
        self.cash += pnl;

        self.trades.push(Trade {
            id: position.trade_id,
            direction: position.direction,
            quantity: position.quantity,
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            exit_date: Some(date),
            exit_price: Some(exit_price),
            entry_commission: position.entry_commission,
            exit_commission,
            pnl: Some(pnl),
            forced_close: forced,
        });
    }

    fn apply(&mut self, signal: Signal, open_price: f64, date: NaiveDate) {
        let held = self.open.as_ref().map(|p| p.direction);
        match (held, signal) {
            (None, Signal::EnterLong) => self.enter(Direction::Long, open_price, date),
            (None, Signal::EnterShort) => {
                if self.config.allow_shorting {
                    self.enter(Direction::Short, open_price, date);
                }
            }
            (None, _) => {}
            (Some(_), Signal::Exit) => self.close(open_price, date, false),
            (Some(Direction::Short), Signal::EnterLong) => {
                if self.config.allow_reversal {
                    self.close(open_price, date, false);
                    self.enter(Direction::Long, open_price, date);
                }
            }
            (Some(Direction::Long), Signal::EnterShort) => {
                if self.config.allow_reversal && self.config.allow_shorting {
                    self.close(open_price, date, false);
                    self.enter(Direction::Short, open_price, date);
                }
            }
            // Hold, or an entry in the direction already held.
            (Some(_), _) => {}
        }
    }

    fn equity_at(&self, close: f64) -> f64 {
        match self.config.equity_mode {
            EquityMode::CashOnly => self.cash,
            EquityMode::MarkToMarket => {
                self.cash
                    + self
                        .open
                        .as_ref()
                        .map(|p| p.unrealized_pnl(close))
                        .unwrap_or(0.0)
            }
        }
    }
}

/// Run the fill simulation over the full series.
///
/// `signals` must be aligned 1:1 with `bars`; the signal at index i is the
/// decision taken on bar i's close and fills at bar i+1's open.
pub fn simulate(
    bars: &[Bar],
    signals: &[Signal],
    initial_capital: f64,
    config: &ExecutionConfig,
    cancel: &CancelToken,
) -> Result<Simulation, BacksimError> {
    debug_assert_eq!(bars.len(), signals.len());

    let mut sim = Simulator::new(initial_capital, config);
    let mut equity_curve = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        cancel.check("simulation")?;

        if i > 0 {
            sim.apply(signals[i - 1], bar.open, bar.date);
        }

        if i == bars.len() - 1 && sim.open.is_some() {
            sim.close(bar.close, bar.date, true);
        }

        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: sim.equity_at(bar.close),
        });
    }

    Ok(Simulation {
        trades: sim.trades,
        equity_curve,
        skipped_entries: sim.skipped_entries,
        equity_mode: config.equity_mode,
    })
}
