//! Position — the single open trade, owned by the engine while it is open.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Open long position.
///
/// `peak_profit` is the best unrealized PnL seen since entry. It only moves
/// up and starts at zero for every new position, so trailing-stop memory never
/// leaks between trades or runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub size: u32,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub entry_equity: f64,
    pub peak_profit: f64,
}

impl Position {
    /// Unrealized PnL if closed at `price`.
    pub fn unrealized_pnl(&self, price: f64, point_value: f64) -> f64 {
        (price - self.entry_price) * f64::from(self.size) * point_value
    }

    /// Mark the position to `close`, raising `peak_profit` when exceeded.
    pub fn mark(&mut self, close: f64, point_value: f64) {
        let pnl = self.unrealized_pnl(close, point_value);
        if pnl > self.peak_profit {
            self.peak_profit = pnl;
        }
    }

    /// Currency amount lost if the stop is hit.
    pub fn risk_amount(&self, point_value: f64) -> f64 {
        (self.entry_price - self.stop_loss) * f64::from(self.size) * point_value
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar)
    }
}
