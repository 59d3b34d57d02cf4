//! Core domain logic, free of I/O.

pub mod analysis;
pub mod bar;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod runner;
pub mod signal;
pub mod strategy;
pub mod validation;
