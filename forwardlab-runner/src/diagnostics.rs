//! Sanity checks over loaded data and backtest output.
//!
//! None of these checks fail a run. They produce findings that point at
//! suspicious data (price spikes, off-tick prices, missing indicators) or suspicious results
//! (fills outside the bar, PnL that does not recompute, implausible returns).

use serde::{Deserialize, Serialize};
use std::fmt;

use forwardlab_core::domain::{Bar, ExitReason, Instrument};
use forwardlab_core::engine::RunResult;
use forwardlab_core::indicators::names;

use crate::metrics::TradeStats;

/// Close-to-close move treated as a data spike.
pub const LARGE_MOVE_FRACTION: f64 = 0.05;
pub const MAX_WIN_LOSS_RATIO: f64 = 5.0;
pub const MAX_POSITION_SIZE: u32 = 100;
pub const PNL_TOLERANCE: f64 = 0.01;
pub const MAX_RETURN_PCT: f64 = 100.0;
pub const MAX_TAKE_PROFIT_SHARE: f64 = 70.0;

const FILL_EPSILON: f64 = 1e-9;
const MAX_LISTED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub check: String,
    pub message: String,
}

impl Finding {
    fn info(check: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            check: check.to_string(),
            message: message.into(),
        }
    }

    fn warning(check: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            check: check.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.check, self.message)
    }
}

/// Descriptive statistics of a bar series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub bar_count: usize,
    pub min_low: f64,
    pub max_high: f64,
    pub large_moves: usize,
    /// Mean of the defined `atr_14` values, if any.
    pub mean_atr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub data: DataSummary,
    pub findings: Vec<Finding>,
}

impl DiagnosticsReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }
}

// ─── Data checks ────────────────────────────────────────────────────

pub fn check_data(bars: &[Bar]) -> (DataSummary, Vec<Finding>) {
    let mut findings = Vec::new();

    let min_low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let max_high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

    let large: Vec<usize> = bars
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].close > 0.0 && (w[1].close / w[0].close - 1.0).abs() > LARGE_MOVE_FRACTION)
        .map(|(i, _)| i + 1)
        .collect();
    if !large.is_empty() {
        findings.push(Finding::warning(
            "large_moves",
            format!(
                "{} close-to-close moves above {:.0}% (first at bars {:?})",
                large.len(),
                LARGE_MOVE_FRACTION * 100.0,
                &large[..large.len().min(MAX_LISTED)]
            ),
        ));
    }

    let atr: Vec<f64> = bars.iter().filter_map(|b| b.indicator(names::ATR)).collect();
    let mean_atr = if atr.is_empty() {
        findings.push(Finding::warning(
            "atr",
            format!("no defined {} values; strategies cannot size positions", names::ATR),
        ));
        None
    } else {
        let mean = atr.iter().sum::<f64>() / atr.len() as f64;
        let min = atr.iter().copied().fold(f64::INFINITY, f64::min);
        let max = atr.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        findings.push(Finding::info(
            "atr",
            format!("mean {mean:.6}, min {min:.6}, max {max:.6} over {} bars", atr.len()),
        ));
        Some(mean)
    };

    let summary = DataSummary {
        bar_count: bars.len(),
        min_low: if bars.is_empty() { 0.0 } else { min_low },
        max_high: if bars.is_empty() { 0.0 } else { max_high },
        large_moves: large.len(),
        mean_atr,
    };
    (summary, findings)
}

/// Note bars with a price off the instrument's tick grid, which usually means
/// the configured instrument does not match the data.
pub fn check_tick_grid(bars: &[Bar], instrument: &Instrument) -> Option<Finding> {
    let tolerance = instrument.tick_size * 1e-6;
    let off_grid: Vec<usize> = indices(bars.iter().map(|b| {
        [b.open, b.high, b.low, b.close]
            .iter()
            .any(|&p| (instrument.round_to_tick(p) - p).abs() > tolerance)
    }));
    if off_grid.is_empty() {
        return None;
    }
    Some(Finding::info(
        "tick_grid",
        format!(
            "{} bars with prices off the {} tick grid of {} (first at bars {:?})",
            off_grid.len(),
            instrument.tick_size,
            instrument.symbol,
            listed(&off_grid)
        ),
    ))
}

// ─── Trade checks ───────────────────────────────────────────────────

/// Check a run's trades against the bars it was run on.
pub fn check_trades(bars: &[Bar], result: &RunResult, instrument: &Instrument) -> Vec<Finding> {
    let mut findings = Vec::new();
    let trades = &result.trades;
    if trades.is_empty() {
        findings.push(Finding::info("trades", "no trades"));
        return findings;
    }
    let stats = TradeStats::compute(trades, result.initial_capital, &result.equity_curve);

    if stats.avg_loss < 0.0 {
        let ratio = (stats.avg_win / stats.avg_loss).abs();
        if ratio > MAX_WIN_LOSS_RATIO {
            findings.push(Finding::warning(
                "win_loss_ratio",
                format!("average win is {ratio:.1}x the average loss"),
            ));
        }
    }

    let oversized: Vec<usize> = indices(trades.iter().map(|t| t.size > MAX_POSITION_SIZE));
    if !oversized.is_empty() {
        let max = trades.iter().map(|t| t.size).max().unwrap_or(0);
        findings.push(Finding::warning(
            "position_size",
            format!(
                "{} trades above {MAX_POSITION_SIZE} contracts (max {max}, trades {:?})",
                oversized.len(),
                listed(&oversized)
            ),
        ));
    }

    let outside: Vec<usize> = indices(trades.iter().map(|t| {
        let level_fill = matches!(
            t.exit_reason,
            ExitReason::StopLoss | ExitReason::TakeProfit | ExitReason::TrailingStop
        );
        level_fill
            && bars.get(t.exit_bar).is_some_and(|b| {
                t.exit_price < b.low - FILL_EPSILON || t.exit_price > b.high + FILL_EPSILON
            })
    }));
    if !outside.is_empty() {
        findings.push(Finding::warning(
            "fill_range",
            format!(
                "{} stop/target fills outside the exit bar's high-low range (trades {:?})",
                outside.len(),
                listed(&outside)
            ),
        ));
    }

    let mismatched: Vec<usize> = indices(trades.iter().map(|t| {
        let expected = instrument.pnl(t.exit_price - t.entry_price, t.size);
        (expected - t.pnl).abs() > PNL_TOLERANCE
    }));
    if !mismatched.is_empty() {
        findings.push(Finding::warning(
            "pnl_recompute",
            format!(
                "{} trades whose PnL does not match (exit - entry) x size x point_value (trades {:?})",
                mismatched.len(),
                listed(&mismatched)
            ),
        ));
    }

    if stats.total_return_pct > MAX_RETURN_PCT {
        findings.push(Finding::warning(
            "return",
            format!("total return {:.1}% is implausibly high", stats.total_return_pct),
        ));
    }

    findings.push(Finding::info(
        "streaks",
        format!(
            "longest winning streak {}, longest losing streak {}",
            stats.longest_win_streak, stats.longest_loss_streak
        ),
    ));

    let distribution: Vec<String> = stats
        .exit_reasons
        .iter()
        .map(|(reason, n)| format!("{reason} {n} ({:.1}%)", stats.exit_share(*reason)))
        .collect();
    findings.push(Finding::info("exit_reasons", distribution.join(", ")));

    let tp_share = stats.exit_share(ExitReason::TakeProfit);
    if tp_share > MAX_TAKE_PROFIT_SHARE {
        findings.push(Finding::warning(
            "take_profit_share",
            format!("{tp_share:.1}% of trades exit at take-profit; targets may be too tight"),
        ));
    }

    findings
}

/// Run data and trade checks together.
pub fn diagnose(bars: &[Bar], result: &RunResult, instrument: &Instrument) -> DiagnosticsReport {
    let (data, mut findings) = check_data(bars);
    findings.extend(check_tick_grid(bars, instrument));
    findings.extend(check_trades(bars, result, instrument));
    DiagnosticsReport { data, findings }
}

fn indices(flags: impl Iterator<Item = bool>) -> Vec<usize> {
    flags
        .enumerate()
        .filter_map(|(i, hit)| hit.then_some(i))
        .collect()
}

fn listed(indices: &[usize]) -> &[usize] {
    &indices[..indices.len().min(MAX_LISTED)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use forwardlab_core::domain::Trade;

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(5 * i as i64)
    }

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(ts(i), c, c + 1.0, c - 1.0, c, 100.0).with_indicator(names::ATR, 2.0))
            .collect()
    }

    fn trade(entry: f64, exit: f64, size: u32, reason: ExitReason, exit_bar: usize) -> Trade {
        let pnl = (exit - entry) * f64::from(size) * 20.0;
        Trade {
            entry_bar: 0,
            entry_time: ts(0),
            entry_price: entry,
            exit_bar,
            exit_time: ts(exit_bar),
            exit_price: exit,
            exit_reason: reason,
            size,
            pnl,
            pnl_pct: 0.0,
            equity_after: 0.0,
        }
    }

    fn result(trades: Vec<Trade>) -> RunResult {
        let final_equity = 100_000.0 + trades.iter().map(|t| t.pnl).sum::<f64>();
        RunResult {
            initial_capital: 100_000.0,
            final_equity,
            bar_count: 0,
            trades,
            equity_curve: Vec::new(),
        }
    }

    fn checks(findings: &[Finding], severity: Severity) -> Vec<&str> {
        findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| f.check.as_str())
            .collect()
    }

    #[test]
    fn flags_large_moves() {
        let (summary, findings) = check_data(&bars(&[100.0, 101.0, 110.0, 109.0]));
        assert_eq!(summary.large_moves, 1);
        assert_eq!(summary.bar_count, 4);
        assert_eq!(summary.mean_atr, Some(2.0));
        assert_eq!(checks(&findings, Severity::Warning), vec!["large_moves"]);
    }

    #[test]
    fn warns_when_atr_missing() {
        let plain: Vec<Bar> = (0..3).map(|i| Bar::new(ts(i), 10.0, 11.0, 9.0, 10.0, 1.0)).collect();
        let (summary, findings) = check_data(&plain);
        assert_eq!(summary.mean_atr, None);
        assert!(checks(&findings, Severity::Warning).contains(&"atr"));
    }

    #[test]
    fn clean_run_has_no_warnings() {
        let data = bars(&[100.0, 100.5, 101.0, 101.5]);
        let run = result(vec![
            trade(100.0, 101.0, 2, ExitReason::TakeProfit, 2),
            trade(101.0, 100.8, 2, ExitReason::EndOfData, 3),
        ]);
        let report = diagnose(&data, &run, &Instrument::nq());
        assert_eq!(report.warnings().count(), 0, "{:?}", report.findings);
    }

    #[test]
    fn flags_fill_outside_bar_range() {
        let data = bars(&[100.0, 100.0, 100.0]);
        let run = result(vec![trade(100.0, 95.0, 1, ExitReason::StopLoss, 2)]);
        let findings = check_trades(&data, &run, &Instrument::nq());
        assert!(checks(&findings, Severity::Warning).contains(&"fill_range"));
    }

    #[test]
    fn flags_pnl_mismatch() {
        let data = bars(&[100.0, 100.0, 100.0]);
        let mut t = trade(100.0, 100.5, 1, ExitReason::EndOfData, 2);
        t.pnl += 1.0;
        let findings = check_trades(&data, &result(vec![t]), &Instrument::nq());
        assert!(checks(&findings, Severity::Warning).contains(&"pnl_recompute"));
    }

    #[test]
    fn flags_oversized_positions_and_high_return() {
        let data = bars(&[100.0, 100.0, 100.0]);
        let run = result(vec![trade(100.0, 100.9, 10_000, ExitReason::EndOfData, 2)]);
        let warnings = check_trades(&data, &run, &Instrument::nq());
        let names = checks(&warnings, Severity::Warning);
        assert!(names.contains(&"position_size"));
        assert!(names.contains(&"return"));
    }

    #[test]
    fn flags_win_loss_ratio_and_take_profit_share() {
        let data = bars(&[100.0; 6]);
        let run = result(vec![
            trade(100.0, 100.9, 1, ExitReason::TakeProfit, 1),
            trade(100.0, 100.9, 1, ExitReason::TakeProfit, 2),
            trade(100.0, 100.9, 1, ExitReason::TakeProfit, 3),
            trade(100.0, 99.95, 1, ExitReason::StopLoss, 4),
        ]);
        let findings = check_trades(&data, &run, &Instrument::nq());
        let names = checks(&findings, Severity::Warning);
        assert!(names.contains(&"win_loss_ratio"));
        assert!(names.contains(&"take_profit_share"));
        assert!(checks(&findings, Severity::Info).contains(&"streaks"));
    }

    #[test]
    fn notes_prices_off_the_tick_grid() {
        let nq = Instrument::nq();
        assert_eq!(check_tick_grid(&bars(&[100.0, 100.25, 101.5]), &nq), None);

        let finding = check_tick_grid(&bars(&[100.0, 100.1, 100.5, 100.3]), &nq).unwrap();
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.check, "tick_grid");
        assert!(finding.message.starts_with("2 bars"), "{}", finding.message);

        let report = diagnose(&bars(&[100.0, 100.1]), &result(Vec::new()), &nq);
        assert!(checks(&report.findings, Severity::Info).contains(&"tick_grid"));
    }

    #[test]
    fn finding_display() {
        let f = Finding::warning("return", "too high");
        assert_eq!(f.to_string(), "[WARN] return: too high");
    }
}
