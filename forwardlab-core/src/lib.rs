//! ForwardLab Core — domain types, indicators, strategies and the backtest engine.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (bars, instrument, position, trades, equity points)
//! - Indicator precomputation with warm-up semantics
//! - The strategy contract and the built-in rule sets
//! - Bar-sequential event loop with single-position accounting

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod strategy;
