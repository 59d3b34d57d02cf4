//! CLI definition and dispatch.
//!
//! Progress and errors go to stderr; the backtest result is emitted as JSON
//! on stdout (or to `--output`), so runs compose with shell pipelines.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::cached_data_adapter::CachedDataAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::cancel::CancelToken;
use crate::domain::config::SimulationSettings;
use crate::domain::error::BacksimError;
use crate::domain::runner::{self, BacktestRequest};
use crate::domain::strategy::StrategyDefinition;
use crate::domain::validation;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "backsim", about = "Rule-based trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy definition (JSON)
        #[arg(short, long)]
        strategy: PathBuf,
        /// Override the symbol from the config
        #[arg(long)]
        symbol: Option<String>,
        /// Write the result JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the Monte Carlo seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a strategy definition without running it
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            symbol,
            output,
            seed,
        } => run_backtest(&config, &strategy, symbol.as_deref(), output.as_ref(), seed),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

fn load_strategy(path: &PathBuf) -> Result<StrategyDefinition, BacksimError> {
    let content = fs::read_to_string(path).map_err(|e| BacksimError::StrategyFile {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| BacksimError::StrategyFile {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn require_date(adapter: &dyn ConfigPort, key: &str) -> Result<NaiveDate, BacksimError> {
    let value = adapter
        .get_string("backtest", key)
        .ok_or_else(|| BacksimError::ConfigMissing {
            section: "backtest".into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| BacksimError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

fn require_string(adapter: &dyn ConfigPort, key: &str) -> Result<String, BacksimError> {
    adapter
        .get_string("backtest", key)
        .ok_or_else(|| BacksimError::ConfigMissing {
            section: "backtest".into(),
            key: key.into(),
        })
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_path: &PathBuf,
    symbol_override: Option<&str>,
    output_path: Option<&PathBuf>,
    seed_override: Option<u64>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let mut settings = match SimulationSettings::from_config(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Some(seed) = seed_override {
        settings.monte_carlo.seed = seed;
    }

    let request = match build_request(&adapter, strategy_path, symbol_override) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Running backtest: {} '{}', {} to {}",
        request.symbol, request.strategy.name, request.start_date, request.end_date
    );

    let data_dir = match require_string(&adapter, "data_dir") {
        Ok(d) => PathBuf::from(d),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = CachedDataAdapter::new(CsvAdapter::new(data_dir), settings.cache_ttl);

    let cancel = match settings.timeout {
        Some(timeout) => CancelToken::with_timeout(timeout),
        None => CancelToken::none(),
    };

    let result = match runner::run_backtest(&data_port, &request, &settings, &cancel) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\n=== Results ===");
    eprintln!("Total Return:   {:.2}%", result.metrics.total_return);
    eprintln!("Sharpe Ratio:   {:.2}", result.metrics.sharpe_ratio);
    eprintln!("Max Drawdown:   {:.1}%", result.metrics.max_drawdown);
    eprintln!("Win Rate:       {:.1}%", result.metrics.win_rate);
    eprintln!("Trades:         {}", result.trades.len());
    if result.metadata.skipped_entries > 0 {
        eprintln!("Skipped:        {} entries", result.metadata.skipped_entries);
    }
    eprintln!(
        "MC Return p5/p50/p95: {:.2}% / {:.2}% / {:.2}%",
        result.monte_carlo.return_p5, result.monte_carlo.return_p50, result.monte_carlo.return_p95
    );

    let json = match serde_json::to_string_pretty(&result) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            return ExitCode::from(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                eprintln!("error: failed to write {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
            eprintln!("\nResult written to: {}", path.display());
        }
        None => println!("{json}"),
    }

    ExitCode::SUCCESS
}

fn build_request(
    adapter: &dyn ConfigPort,
    strategy_path: &PathBuf,
    symbol_override: Option<&str>,
) -> Result<BacktestRequest, BacksimError> {
    let symbol = match symbol_override {
        Some(s) => s.to_uppercase(),
        None => require_string(adapter, "symbol")?.to_uppercase(),
    };

    eprintln!("Loading strategy from {}", strategy_path.display());
    let strategy = load_strategy(strategy_path)?;

    Ok(BacktestRequest {
        symbol,
        start_date: require_date(adapter, "start_date")?,
        end_date: require_date(adapter, "end_date")?,
        strategy,
    })
}

fn run_validate(strategy_path: &PathBuf) -> ExitCode {
    eprintln!("Validating strategy: {}", strategy_path.display());

    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if let Err(e) = validation::validate_definition(&strategy) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("  id:         {}", strategy.id);
    eprintln!("  name:       {}", strategy.name);
    eprintln!("  direction:  {:?}", strategy.direction);
    eprintln!("  indicators: {}", strategy.indicators.len());
    eprintln!("  entry:      {} condition(s)", strategy.entry.len());
    if strategy.exit.is_empty() {
        eprintln!("  exit:       inverse of entry");
    } else {
        eprintln!("  exit:       {} condition(s)", strategy.exit.len());
    }
    eprintln!("\nStrategy definition is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let data_dir = match require_string(&adapter, "data_dir") {
        Ok(d) => PathBuf::from(d),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = match CsvAdapter::new(data_dir).list_symbols() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
