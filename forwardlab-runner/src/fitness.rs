//! Fitness function — the weighted score used to rank grid trials.

use serde::{Deserialize, Serialize};

use crate::metrics::TradeStats;

/// Weights of the in-sample fitness score.
///
/// `score = pnl × total_pnl + profit_factor × pf × 1000 + win_rate × wr × 10
/// + trade_count × n`, with win rate in percent. The scale factors bring the
/// terms to comparable magnitudes for account sizes around 100k.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub pnl: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
    pub trade_count: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            pnl: 0.4,
            profit_factor: 0.3,
            win_rate: 0.2,
            trade_count: 0.1,
        }
    }
}

impl FitnessWeights {
    pub fn score(&self, stats: &TradeStats) -> f64 {
        self.pnl * stats.total_pnl
            + self.profit_factor * stats.profit_factor * 1000.0
            + self.win_rate * stats.win_rate * 10.0
            + self.trade_count * stats.total_trades as f64
    }

    /// Whether every weight is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.pnl, self.profit_factor, self.win_rate, self.trade_count]
            .iter()
            .all(|w| w.is_finite())
    }

    /// Compare two scores. Returns true only if `a` is strictly better than
    /// `b`, so the first of several equal scores keeps its place.
    pub fn is_better(a: f64, b: f64) -> bool {
        a > b
    }
}
