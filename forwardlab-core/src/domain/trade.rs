//! Trade — a completed round trip, its exit reason, and per-bar equity points.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    OppositeCrossover,
    DeathCross,
    SmaBreakdown,
    EmaTarget,
    Overbought,
    Breakdown,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::OppositeCrossover => "opposite_crossover",
            ExitReason::DeathCross => "death_cross",
            ExitReason::SmaBreakdown => "sma_breakdown",
            ExitReason::EmaTarget => "ema_target",
            ExitReason::Overbought => "overbought",
            ExitReason::Breakdown => "breakdown",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed round-trip trade. Written once on exit, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub size: u32,

    // ── PnL ──
    pub pnl: f64,
    /// PnL as a percentage of the account equity at entry.
    pub pnl_pct: f64,
    pub equity_after: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar - self.entry_bar
    }
}

/// Account value recorded once per processed bar, before that bar's decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub position_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_trade(pnl: f64) -> Trade {
        Trade {
            entry_bar: 4,
            entry_time: at(5),
            entry_price: 100.0,
            exit_bar: 8,
            exit_time: at(11),
            exit_price: 110.0,
            exit_reason: ExitReason::TakeProfit,
            size: 1,
            pnl,
            pnl_pct: pnl / 1000.0,
            equity_after: 100_000.0 + pnl,
        }
    }

    #[test]
    fn winner_requires_positive_pnl() {
        assert!(sample_trade(10.0).is_winner());
        assert!(!sample_trade(0.0).is_winner());
        assert!(!sample_trade(-5.0).is_winner());
    }

    #[test]
    fn bars_held() {
        assert_eq!(sample_trade(1.0).bars_held(), 4);
    }

    #[test]
    fn exit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::EndOfData).unwrap();
        assert_eq!(json, "\"end_of_data\"");
        let back: ExitReason = serde_json::from_str("\"opposite_crossover\"").unwrap();
        assert_eq!(back, ExitReason::OppositeCrossover);
    }

    #[test]
    fn exit_reason_display_matches_serde() {
        for reason in [
            ExitReason::StopLoss,
            ExitReason::TrailingStop,
            ExitReason::SmaBreakdown,
            ExitReason::EmaTarget,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json.trim_matches('"'), reason.to_string());
        }
    }
}
