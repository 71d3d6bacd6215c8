//! Backtesting engine — the bar-sequential event loop.
//!
//! Per bar, strictly in index order:
//!
//! 1. Record an equity point with the pre-decision account value
//! 2. With a position open: mark it to the close, then ask for an exit
//! 3. Otherwise: ask for an entry and open a position at the close
//!
//! A position still open after the last bar is closed at that bar's close
//! with reason `end_of_data`.

pub mod loop_runner;
pub mod state;

pub use loop_runner::run_backtest;
pub use state::{EngineConfig, EngineError, EngineState, RunResult};
