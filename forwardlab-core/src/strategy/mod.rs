//! Strategy contract and the built-in rule sets.
//!
//! A strategy is an immutable decision component. The engine hands it a
//! [`History`] ending at the current bar and, while a trade is open, the
//! engine-owned [`Position`]. Any per-trade memory the rules need (the
//! trailing-stop high-water mark) lives on the position, which the engine
//! creates fresh for every trade.

pub mod factory;
pub mod history;
pub mod mean_reversion;
pub mod params;
pub mod risk;
pub mod sma_cross;
pub mod trend;

pub use factory::{StrategyFactory, StrategyKind};
pub use history::History;
pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use params::{ParamError, ParamSet};
pub use risk::RiskModel;
pub use sma_cross::{SmaCross, SmaCrossParams};
pub use trend::{TrendCrossover, TrendParams};

use crate::domain::{ExitReason, Position};
use serde::{Deserialize, Serialize};

/// Exit decision with the price the strategy wants to be filled at.
///
/// `price` is only consulted for reasons other than stop-loss, take-profit and
/// end-of-data; `None` means the current bar's close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub price: Option<f64>,
}

impl ExitSignal {
    pub fn new(reason: ExitReason) -> Self {
        Self {
            reason,
            price: None,
        }
    }

    pub fn at(reason: ExitReason, price: f64) -> Self {
        Self {
            reason,
            price: Some(price),
        }
    }
}

/// Stop and target attached to a new position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Decision contract consumed by the backtest engine.
///
/// Every method is a pure function of its arguments.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Bars that must precede the first entry decision.
    ///
    /// A series no longer than this cannot be backtested.
    fn warmup(&self) -> usize {
        0
    }

    fn should_enter(&self, history: &History<'_>) -> bool;

    fn should_exit(&self, history: &History<'_>, position: &Position) -> Option<ExitSignal>;

    /// Contracts to buy on entry at the current bar. Must be at least 1.
    fn size_position(&self, history: &History<'_>, account_value: f64) -> u32;

    /// Stop-loss (required) and optional take-profit for an entry at `entry_price`.
    fn protective_levels(&self, history: &History<'_>, entry_price: f64) -> ProtectiveLevels;
}

/// Both values defined and `a` crossed above `b` between the previous and current bar.
pub(crate) fn crossed_above(history: &History<'_>, a: &str, b: &str) -> bool {
    match (history.indicator_pair(a), history.indicator_pair(b)) {
        (Some((a_now, a_prev)), Some((b_now, b_prev))) => a_prev <= b_prev && a_now > b_now,
        _ => false,
    }
}

/// Both values defined and `a` crossed below `b` between the previous and current bar.
pub(crate) fn crossed_below(history: &History<'_>, a: &str, b: &str) -> bool {
    match (history.indicator_pair(a), history.indicator_pair(b)) {
        (Some((a_now, a_prev)), Some((b_now, b_prev))) => a_prev >= b_prev && a_now < b_now,
        _ => false,
    }
}
