//! Result export: CSV trade/equity tapes, JSON reports, console summaries.
//!
//! Writers build the whole document in memory and write it in one call, so a
//! failed export never leaves a half-written file behind a successful return.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use forwardlab_core::domain::{EquityPoint, Trade};
use forwardlab_core::engine::RunResult;

use crate::metrics::TradeStats;
use crate::walk_forward::WalkForwardReport;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const WALK_FORWARD_SUMMARY_FILE: &str = "walk_forward_summary.json";
pub const WALK_FORWARD_OOS_TRADES_FILE: &str = "walk_forward_oos_trades.csv";

const TRADE_COLUMNS: [&str; 12] = [
    "entry_bar",
    "entry_time",
    "entry_price",
    "exit_bar",
    "exit_time",
    "exit_price",
    "exit_reason",
    "size",
    "pnl",
    "pnl_pct",
    "equity_after",
    "bars_held",
];

fn trade_record(trade: &Trade) -> [String; 12] {
    [
        trade.entry_bar.to_string(),
        trade.entry_time.to_string(),
        trade.entry_price.to_string(),
        trade.exit_bar.to_string(),
        trade.exit_time.to_string(),
        trade.exit_price.to_string(),
        trade.exit_reason.to_string(),
        trade.size.to_string(),
        format!("{:.2}", trade.pnl),
        format!("{:.4}", trade.pnl_pct),
        format!("{:.2}", trade.equity_after),
        trade.bars_held().to_string(),
    ]
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Export a trade log as CSV, one row per trade.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;
    for trade in trades {
        wtr.write_record(trade_record(trade))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV, one row per processed bar.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity", "position_open"])?;
    for point in equity_curve {
        wtr.write_record([
            point.bar_index.to_string(),
            point.timestamp.to_string(),
            format!("{:.2}", point.equity),
            point.position_open.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the combined out-of-sample trade log, tagged with window index.
pub fn export_oos_trades_csv(report: &WalkForwardReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["window"];
    header.extend(TRADE_COLUMNS);
    wtr.write_record(&header)?;
    for window in &report.windows {
        for trade in &window.oos_trades {
            let mut row = vec![window.index.to_string()];
            row.extend(trade_record(trade));
            wtr.write_record(&row)?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_walk_forward_json(report: &WalkForwardReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize walk-forward report")
}

pub fn export_backtest_summary_json(result: &RunResult, stats: &TradeStats) -> Result<String> {
    let summary = json!({
        "initial_capital": result.initial_capital,
        "final_equity": result.final_equity,
        "bar_count": result.bar_count,
        "stats": stats,
    });
    serde_json::to_string_pretty(&summary).context("failed to serialize backtest summary")
}

// ─── Artifact bundles ───────────────────────────────────────────────

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Save `trades.csv`, `equity.csv` and `summary.json` for a single backtest.
///
/// Returns the paths written.
pub fn save_backtest(
    result: &RunResult,
    stats: &TradeStats,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    Ok(vec![
        write_file(output_dir, TRADES_FILE, &export_trades_csv(&result.trades)?)?,
        write_file(output_dir, EQUITY_FILE, &export_equity_csv(&result.equity_curve)?)?,
        write_file(
            output_dir,
            SUMMARY_FILE,
            &export_backtest_summary_json(result, stats)?,
        )?,
    ])
}

/// Save `walk_forward_summary.json` and `walk_forward_oos_trades.csv`.
pub fn save_walk_forward(report: &WalkForwardReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    Ok(vec![
        write_file(
            output_dir,
            WALK_FORWARD_SUMMARY_FILE,
            &export_walk_forward_json(report)?,
        )?,
        write_file(
            output_dir,
            WALK_FORWARD_OOS_TRADES_FILE,
            &export_oos_trades_csv(report)?,
        )?,
    ])
}

// ─── Console summaries ──────────────────────────────────────────────

/// Human-readable statistics block.
pub fn format_stats(stats: &TradeStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Trades:          {}\n", stats.total_trades));
    out.push_str(&format!(
        "Win rate:        {:.2}% ({} W / {} L)\n",
        stats.win_rate, stats.winners, stats.losers
    ));
    out.push_str(&format!("Total PnL:       {:.2}\n", stats.total_pnl));
    out.push_str(&format!("Return:          {:.2}%\n", stats.total_return_pct));
    out.push_str(&format!("Avg win:         {:.2}\n", stats.avg_win));
    out.push_str(&format!("Avg loss:        {:.2}\n", stats.avg_loss));
    out.push_str(&format!("Profit factor:   {:.2}\n", stats.profit_factor));
    out.push_str(&format!("Max drawdown:    {:.2}%\n", stats.max_drawdown * 100.0));
    out.push_str(&format!(
        "Streaks:         {} W / {} L\n",
        stats.longest_win_streak, stats.longest_loss_streak
    ));
    if !stats.exit_reasons.is_empty() {
        out.push_str("Exit reasons:\n");
        for (reason, count) in &stats.exit_reasons {
            out.push_str(&format!(
                "  {:<20} {:>5} ({:.1}%)\n",
                reason.as_str(),
                count,
                stats.exit_share(*reason)
            ));
        }
    }
    out
}

/// Per-window table plus the aggregate OOS summary.
pub fn format_walk_forward(report: &WalkForwardReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:>15}  {:>15}  {:>12}  {:>6}  {:>12}  params\n",
        "win", "in-sample", "out-of-sample", "is_score", "trades", "oos_pnl"
    ));
    for w in &report.windows {
        let params = w
            .best_params
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "{:>4}  {:>15}  {:>15}  {:>12.2}  {:>6}  {:>12.2}  {}\n",
            w.index,
            format!("{}..{}", w.is_start, w.is_end),
            format!("{}..{}", w.oos_start, w.oos_end),
            w.is_score.unwrap_or(f64::NEG_INFINITY),
            w.oos_stats.total_trades,
            w.oos_stats.total_pnl,
            params
        ));
    }
    let s = &report.summary;
    out.push('\n');
    out.push_str(&format!("Windows:         {}\n", s.window_count));
    out.push_str(&format!("OOS trades:      {}\n", s.total_oos_trades));
    out.push_str(&format!("OOS PnL:         {:.2}\n", s.total_oos_pnl));
    out.push_str(&format!("OOS return:      {:.2}%\n", s.oos_return_pct));
    out.push_str(&format!("Avg OOS win rate:{:>7.2}%\n", s.avg_oos_win_rate));
    if report.interrupted {
        out.push_str("(interrupted: partial report)\n");
    }
    out
}
