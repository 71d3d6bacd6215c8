//! Trade statistics — pure functions that summarize a backtest run.
//!
//! Every metric is a pure function: trade list and/or equity curve in, scalar
//! out. Degenerate inputs (no trades, no losers, flat equity) resolve to 0
//! rather than NaN or infinity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use forwardlab_core::domain::{EquityPoint, ExitReason, Trade};

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winners: usize,
    pub losers: usize,
    /// Percentage of trades with positive PnL (0–100).
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_win: f64,
    /// Mean PnL of losing trades; zero or negative.
    pub avg_loss: f64,
    pub profit_factor: f64,
    /// Total PnL relative to initial capital, in percent.
    pub total_return_pct: f64,
    /// Deepest peak-to-trough decline of the equity curve as a fraction (≤ 0).
    pub max_drawdown: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
}

impl TradeStats {
    /// Compute all statistics from a trade log and its equity curve.
    pub fn compute(trades: &[Trade], initial_capital: f64, equity_curve: &[EquityPoint]) -> Self {
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let total_pnl = total_pnl(trades);
        let (longest_win_streak, longest_loss_streak) = longest_streaks(trades);
        Self {
            total_trades: trades.len(),
            winners,
            losers: trades.len() - winners,
            win_rate: win_rate(trades),
            total_pnl,
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            profit_factor: profit_factor(trades),
            total_return_pct: return_pct(total_pnl, initial_capital),
            max_drawdown: max_drawdown(equity_curve),
            longest_win_streak,
            longest_loss_streak,
            exit_reasons: exit_reason_counts(trades),
        }
    }

    /// Share of trades closed for `reason`, in percent.
    pub fn exit_share(&self, reason: ExitReason) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        let count = self.exit_reasons.get(&reason).copied().unwrap_or(0);
        count as f64 / self.total_trades as f64 * 100.0
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_pnl(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.pnl).sum()
}

/// Win rate in percent. Zero for an empty trade log.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

pub fn avg_win(trades: &[Trade]) -> f64 {
    mean(trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl))
}

/// Mean PnL over trades with PnL ≤ 0.
pub fn avg_loss(trades: &[Trade]) -> f64 {
    mean(trades.iter().filter(|t| !t.is_winner()).map(|t| t.pnl))
}

/// Profit factor: |avg_win × winners / (avg_loss × losers)|.
///
/// Losers are trades with PnL ≤ 0, so breakeven trades count against the
/// denominator. Returns 0 when there are no losers or their mean PnL is 0.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    let losers = trades.len() - winners;
    let avg_loss = avg_loss(trades);
    if losers == 0 || avg_loss == 0.0 {
        return 0.0;
    }
    let gross_win = avg_win(trades) * winners as f64;
    let gross_loss = avg_loss * losers as f64;
    (gross_win / gross_loss).abs()
}

/// Return in percent of `initial_capital`. Zero for non-positive capital.
pub fn return_pct(total_pnl: f64, initial_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    total_pnl / initial_capital * 100.0
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (point.equity - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Longest consecutive (winning, losing) runs in trade order.
pub fn longest_streaks(trades: &[Trade]) -> (usize, usize) {
    let mut best_win = 0;
    let mut best_loss = 0;
    let mut win_run = 0;
    let mut loss_run = 0;
    for trade in trades {
        if trade.is_winner() {
            win_run += 1;
            loss_run = 0;
            best_win = best_win.max(win_run);
        } else {
            loss_run += 1;
            win_run = 0;
            best_loss = best_loss.max(loss_run);
        }
    }
    (best_win, best_loss)
}

pub fn exit_reason_counts(trades: &[Trade]) -> BTreeMap<ExitReason, usize> {
    let mut counts = BTreeMap::new();
    for trade in trades {
        *counts.entry(trade.exit_reason).or_insert(0) += 1;
    }
    counts
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
