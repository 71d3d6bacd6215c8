//! Engine configuration, mutable state, errors and run result types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EquityPoint, ExitReason, Instrument, InstrumentError, Position, Trade};

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Contract used for PnL scaling.
    pub instrument: Instrument,
}

impl EngineConfig {
    pub fn new(initial_capital: f64, instrument: Instrument) -> Self {
        Self {
            initial_capital,
            instrument,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("insufficient data: got {bars} bars, strategy needs more than {warmup}")]
    InsufficientData { bars: usize, warmup: usize },

    #[error("initial capital must be positive, got {capital}")]
    InvalidCapital { capital: f64 },

    #[error("invalid position at bar {bar_index}: {reason}")]
    InvalidPosition { bar_index: usize, reason: String },

    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}

/// Mutable state that evolves bar-by-bar during the engine loop.
#[derive(Debug)]
pub struct EngineState {
    pub account_value: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl EngineState {
    pub fn new(initial_capital: f64, expected_bars: usize) -> Self {
        Self {
            account_value: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::with_capacity(expected_bars),
        }
    }

    pub fn record_equity(&mut self, bar_index: usize, timestamp: NaiveDateTime) {
        self.equity_curve.push(EquityPoint {
            bar_index,
            timestamp,
            equity: self.account_value,
            position_open: self.position.is_some(),
        });
    }

    /// Install a new position.
    ///
    /// # Panics
    /// Panics if a position is already open; at most one may exist at a time.
    pub fn open(&mut self, position: Position) {
        assert!(
            self.position.is_none(),
            "single-position invariant violated: entry at bar {} while a position from bar {} is open",
            position.entry_bar,
            self.position.as_ref().map_or(0, |p| p.entry_bar),
        );
        self.position = Some(position);
    }

    /// Close the open position at `exit_price` and book its PnL.
    ///
    /// Returns `None` when no position is open.
    pub fn close(
        &mut self,
        exit_bar: usize,
        exit_time: NaiveDateTime,
        exit_price: f64,
        exit_reason: ExitReason,
        point_value: f64,
    ) -> Option<&Trade> {
        let position = self.position.take()?;
        let pnl = position.unrealized_pnl(exit_price, point_value);
        self.account_value += pnl;

        self.trades.push(Trade {
            entry_bar: position.entry_bar,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_bar,
            exit_time,
            exit_price,
            exit_reason,
            size: position.size,
            pnl,
            pnl_pct: pnl / position.entry_equity * 100.0,
            equity_after: self.account_value,
        });
        self.trades.last()
    }

    pub fn into_result(self, initial_capital: f64) -> RunResult {
        RunResult {
            initial_capital,
            final_equity: self.account_value,
            bar_count: self.equity_curve.len(),
            trades: self.trades,
            equity_curve: self.equity_curve,
        }
    }
}

/// Complete output of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub bar_count: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl RunResult {
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    /// Return on initial capital, in percent.
    pub fn return_pct(&self) -> f64 {
        (self.final_equity - self.initial_capital) / self.initial_capital * 100.0
    }
}
