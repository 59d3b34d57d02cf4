//! backsim: rule-based trading strategy backtester.
//!
//! Hexagonal layout: `domain` holds the pure backtest core (indicators,
//! strategy compilation, signal evaluation, fill simulation, analysis),
//! `ports` defines the traits the domain consumes, and `adapters` provides
//! the file-backed implementations used by the CLI.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
