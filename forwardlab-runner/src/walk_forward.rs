//! Walk-forward optimization — rolling in-sample grid search with
//! out-of-sample validation.
//!
//! The bar series is scanned with a rolling window: `in_sample_len` bars for
//! the parameter search, followed immediately by `out_sample_len` bars on
//! which the winning parameter set is replayed once. The window then advances
//! by `step_len` bars. Windows overlap whenever `step_len` is shorter than the
//! combined window length.
//!
//! Every trial and every out-of-sample run starts from a fresh account at the
//! configured initial capital, so no result depends on the previous one.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

use forwardlab_core::domain::{Bar, Instrument, InstrumentError, Trade};
use forwardlab_core::engine::{run_backtest, EngineConfig, EngineError};
use forwardlab_core::strategy::{ParamError, ParamSet, Strategy, StrategyFactory};

use crate::fitness::FitnessWeights;
use crate::grid::{GridError, ParamGrid};
use crate::metrics::TradeStats;

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for a walk-forward optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub in_sample_len: usize,
    pub out_sample_len: usize,
    pub step_len: usize,
    pub initial_capital: f64,
    pub instrument: Instrument,
    #[serde(default)]
    pub fitness: FitnessWeights,
    /// Fixed parameters every trial starts from; grid values override them.
    #[serde(default)]
    pub base_params: ParamSet,
    /// Evaluate the trials of one window on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            in_sample_len: 10_000,
            out_sample_len: 5_000,
            step_len: 2_500,
            initial_capital: 100_000.0,
            instrument: Instrument::eurusd(),
            fitness: FitnessWeights::default(),
            base_params: ParamSet::new(),
            parallel: true,
        }
    }
}

impl WalkForwardConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.initial_capital, self.instrument.clone())
    }

    fn validate(&self) -> Result<(), WalkForwardError> {
        if self.in_sample_len == 0 || self.out_sample_len == 0 || self.step_len == 0 {
            return Err(WalkForwardError::InvalidWindowConfig {
                in_sample_len: self.in_sample_len,
                out_sample_len: self.out_sample_len,
                step_len: self.step_len,
            });
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(WalkForwardError::InvalidCapital {
                capital: self.initial_capital,
            });
        }
        self.instrument.validate()?;
        Ok(())
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Bar index ranges of one window. All ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub is_start: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
}

/// Outcome of one completed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub index: usize,
    pub is_start: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
    pub is_start_time: NaiveDateTime,
    pub is_end_time: NaiveDateTime,
    pub oos_start_time: NaiveDateTime,
    pub oos_end_time: NaiveDateTime,
    /// Winning parameter set; `None` when every trial failed.
    pub best_params: Option<ParamSet>,
    /// In-sample fitness of `best_params`.
    pub is_score: Option<f64>,
    pub trials: usize,
    pub failed_trials: usize,
    /// Out-of-sample trades, bar indices relative to the full series.
    pub oos_trades: Vec<Trade>,
    pub oos_stats: TradeStats,
}

/// Aggregate out-of-sample figures across all completed windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub window_count: usize,
    pub total_oos_pnl: f64,
    /// Mean of per-window OOS win rates, in percent.
    pub avg_oos_win_rate: f64,
    pub total_oos_trades: usize,
    /// Total OOS PnL relative to the initial capital, in percent.
    pub oos_return_pct: f64,
}

/// Complete result of a walk-forward optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub strategy: String,
    pub grid_fingerprint: String,
    pub config: WalkForwardConfig,
    pub windows: Vec<WindowResult>,
    /// Concatenated OOS trade log in window order.
    pub oos_trades: Vec<Trade>,
    pub summary: WalkForwardSummary,
    /// Set when the cancel flag stopped the scan early.
    pub interrupted: bool,
}

/// Errors from walk-forward optimization.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error(
        "invalid window configuration: in_sample_len={in_sample_len}, \
         out_sample_len={out_sample_len}, step_len={step_len} (all must be > 0)"
    )]
    InvalidWindowConfig {
        in_sample_len: usize,
        out_sample_len: usize,
        step_len: usize,
    },

    #[error("initial capital must be positive, got {capital}")]
    InvalidCapital { capital: f64 },

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("invalid parameter grid: {0}")]
    InvalidParamGrid(#[from] GridError),

    #[error("out-of-sample run failed in window {window} (bars {oos_start}..{oos_end}): {source}")]
    WindowFailed {
        window: usize,
        oos_start: usize,
        oos_end: usize,
        #[source]
        source: EngineError,
    },
}

// ─── Window creation ─────────────────────────────────────────────────

/// Create rolling window specifications over `total_bars` bars.
///
/// A window is emitted while `start + in_sample_len + out_sample_len <=
/// total_bars`. Returns an empty list when not even one window fits.
pub fn create_windows(
    total_bars: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<WindowSpec>, WalkForwardError> {
    config.validate()?;

    let mut windows = Vec::new();
    // A span that overflows usize cannot fit in the series.
    let Some(span) = config.in_sample_len.checked_add(config.out_sample_len) else {
        return Ok(windows);
    };
    let mut start: usize = 0;
    while start
        .checked_add(span)
        .is_some_and(|oos_end| oos_end <= total_bars)
    {
        let is_end = start + config.in_sample_len;
        windows.push(WindowSpec {
            index: windows.len(),
            is_start: start,
            is_end,
            oos_start: is_end,
            oos_end: is_end + config.out_sample_len,
        });
        match start.checked_add(config.step_len) {
            Some(next) => start = next,
            None => break,
        }
    }
    Ok(windows)
}

// ─── Grid search ─────────────────────────────────────────────────────

enum TrialOutcome {
    Scored {
        score: f64,
        strategy: Box<dyn Strategy>,
    },
    Failed,
    Cancelled,
}

#[derive(Debug, Error)]
enum TrialError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

fn score_trial(
    bars: &[Bar],
    factory: &dyn StrategyFactory,
    params: &ParamSet,
    config: &WalkForwardConfig,
    engine_config: &EngineConfig,
) -> Result<(f64, Box<dyn Strategy>), TrialError> {
    let strategy = factory.build(params, &config.instrument)?;
    let result = run_backtest(bars, strategy.as_ref(), engine_config)?;
    let stats = TradeStats::compute(&result.trades, result.initial_capital, &result.equity_curve);
    Ok((config.fitness.score(&stats), strategy))
}

fn evaluate(
    window: usize,
    bars: &[Bar],
    factory: &dyn StrategyFactory,
    params: &ParamSet,
    config: &WalkForwardConfig,
    engine_config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> TrialOutcome {
    if is_cancelled(cancel) {
        return TrialOutcome::Cancelled;
    }
    match score_trial(bars, factory, params, config, engine_config) {
        Ok((score, strategy)) => {
            debug!(window, params = %params, score, "trial scored");
            TrialOutcome::Scored { score, strategy }
        }
        Err(e) => {
            warn!(window, params = %params, error = %e, "trial failed, scored as -inf");
            TrialOutcome::Failed
        }
    }
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Run a walk-forward optimization of `factory` over `bars`.
///
/// `cancel` is checked before every trial. A window whose search was cut
/// short is discarded; the report then holds only completed windows and has
/// `interrupted` set.
pub fn run_walk_forward(
    bars: &[Bar],
    factory: &dyn StrategyFactory,
    grid: &ParamGrid,
    config: &WalkForwardConfig,
    cancel: Option<&AtomicBool>,
) -> Result<WalkForwardReport, WalkForwardError> {
    let layout = create_windows(bars.len(), config)?;
    grid.validate(factory)?;

    let combos: Vec<ParamSet> = grid
        .combinations()
        .into_iter()
        .map(|combo| overlay(&config.base_params, &combo))
        .collect();
    let engine_config = config.engine_config();

    if layout.is_empty() {
        warn!(
            bars = bars.len(),
            in_sample_len = config.in_sample_len,
            out_sample_len = config.out_sample_len,
            "series too short for a single walk-forward window"
        );
    } else {
        info!(
            strategy = factory.name(),
            windows = layout.len(),
            trials_per_window = combos.len(),
            parallel = config.parallel,
            "starting walk-forward optimization"
        );
    }

    let mut windows = Vec::with_capacity(layout.len());
    let mut interrupted = false;

    for win in &layout {
        if is_cancelled(cancel) {
            interrupted = true;
            break;
        }

        let is_bars = &bars[win.is_start..win.is_end];
        let eval = |params: &ParamSet| {
            evaluate(win.index, is_bars, factory, params, config, &engine_config, cancel)
        };
        let outcomes: Vec<TrialOutcome> = if config.parallel {
            combos.par_iter().map(eval).collect()
        } else {
            combos.iter().map(eval).collect()
        };

        if outcomes
            .iter()
            .any(|o| matches!(o, TrialOutcome::Cancelled))
        {
            info!(window = win.index, "cancelled during grid search, window discarded");
            interrupted = true;
            break;
        }

        windows.push(finish_window(bars, win, &combos, outcomes, config, &engine_config)?);
    }

    let oos_trades: Vec<Trade> = windows
        .iter()
        .flat_map(|w| w.oos_trades.iter().cloned())
        .collect();
    let summary = summarize(&windows, config.initial_capital);

    info!(
        windows = summary.window_count,
        oos_trades = summary.total_oos_trades,
        oos_pnl = summary.total_oos_pnl,
        oos_return_pct = summary.oos_return_pct,
        interrupted,
        "walk-forward optimization finished"
    );

    Ok(WalkForwardReport {
        strategy: factory.name().to_string(),
        grid_fingerprint: grid.fingerprint(),
        config: config.clone(),
        windows,
        oos_trades,
        summary,
        interrupted,
    })
}

/// Select the best trial and replay it out of sample.
fn finish_window(
    bars: &[Bar],
    win: &WindowSpec,
    combos: &[ParamSet],
    outcomes: Vec<TrialOutcome>,
    config: &WalkForwardConfig,
    engine_config: &EngineConfig,
) -> Result<WindowResult, WalkForwardError> {
    let trials = outcomes.len();
    let mut failed_trials = 0;
    let mut best_score = f64::NEG_INFINITY;
    let mut best: Option<(usize, Box<dyn Strategy>)> = None;

    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            TrialOutcome::Scored { score, strategy } => {
                if FitnessWeights::is_better(score, best_score) {
                    best_score = score;
                    best = Some((i, strategy));
                }
            }
            TrialOutcome::Failed | TrialOutcome::Cancelled => failed_trials += 1,
        }
    }

    let (best_params, is_score, oos_trades, oos_stats) = match best {
        Some((i, strategy)) => {
            let oos_bars = &bars[win.oos_start..win.oos_end];
            let result = run_backtest(oos_bars, strategy.as_ref(), engine_config).map_err(
                |source| WalkForwardError::WindowFailed {
                    window: win.index,
                    oos_start: win.oos_start,
                    oos_end: win.oos_end,
                    source,
                },
            )?;
            let stats =
                TradeStats::compute(&result.trades, config.initial_capital, &result.equity_curve);
            let trades = result
                .trades
                .into_iter()
                .map(|t| offset_trade(t, win.oos_start))
                .collect();
            (Some(combos[i].clone()), Some(best_score), trades, stats)
        }
        None => {
            warn!(
                window = win.index,
                is_start = win.is_start,
                is_end = win.is_end,
                "every trial failed, window has no best parameters"
            );
            (None, None, Vec::new(), TradeStats::default())
        }
    };

    info!(
        window = win.index,
        is = ?(win.is_start..win.is_end),
        oos = ?(win.oos_start..win.oos_end),
        best = %best_params.as_ref().map(ToString::to_string).unwrap_or_else(|| "none".into()),
        is_score = is_score.unwrap_or(f64::NEG_INFINITY),
        oos_trades = oos_stats.total_trades,
        oos_pnl = oos_stats.total_pnl,
        oos_win_rate = oos_stats.win_rate,
        "window complete"
    );

    Ok(WindowResult {
        index: win.index,
        is_start: win.is_start,
        is_end: win.is_end,
        oos_start: win.oos_start,
        oos_end: win.oos_end,
        is_start_time: bars[win.is_start].timestamp,
        is_end_time: bars[win.is_end - 1].timestamp,
        oos_start_time: bars[win.oos_start].timestamp,
        oos_end_time: bars[win.oos_end - 1].timestamp,
        best_params,
        is_score,
        trials,
        failed_trials,
        oos_trades,
        oos_stats,
    })
}

fn overlay(base: &ParamSet, combo: &ParamSet) -> ParamSet {
    combo
        .iter()
        .fold(base.clone(), |acc, (name, value)| acc.with(name, value))
}

/// Shift slice-relative bar indices to full-series indices.
fn offset_trade(mut trade: Trade, offset: usize) -> Trade {
    trade.entry_bar += offset;
    trade.exit_bar += offset;
    trade
}

fn summarize(windows: &[WindowResult], initial_capital: f64) -> WalkForwardSummary {
    let window_count = windows.len();
    let total_oos_pnl: f64 = windows.iter().map(|w| w.oos_stats.total_pnl).sum();
    let total_oos_trades = windows.iter().map(|w| w.oos_stats.total_trades).sum();
    let avg_oos_win_rate = if window_count == 0 {
        0.0
    } else {
        windows.iter().map(|w| w.oos_stats.win_rate).sum::<f64>() / window_count as f64
    };
    WalkForwardSummary {
        window_count,
        total_oos_pnl,
        avg_oos_win_rate,
        total_oos_trades,
        oos_return_pct: crate::metrics::return_pct(total_oos_pnl, initial_capital),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(is: usize, oos: usize, step: usize) -> WalkForwardConfig {
        WalkForwardConfig {
            in_sample_len: is,
            out_sample_len: oos,
            step_len: step,
            ..WalkForwardConfig::default()
        }
    }

    // ─── Window creation tests ───────────────────────────────────

    #[test]
    fn windows_partition_each_span() {
        let windows = create_windows(1000, &config(300, 100, 100)).unwrap();
        assert_eq!(windows.len(), 7);
        for w in &windows {
            assert_eq!(w.oos_start, w.is_end);
            assert_eq!(w.is_end - w.is_start, 300);
            assert_eq!(w.oos_end - w.oos_start, 100);
            assert!(w.oos_end <= 1000);
        }
        assert_eq!(windows.last().unwrap().oos_end, 1000);
    }

    #[test]
    fn windows_advance_by_step() {
        let windows = create_windows(1000, &config(300, 100, 150)).unwrap();
        for pair in windows.windows(2) {
            assert_eq!(pair[1].is_start - pair[0].is_start, 150);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
    }

    #[test]
    fn exact_fit_gives_one_window() {
        let windows = create_windows(400, &config(300, 100, 1000)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].oos_end, 400);
    }

    #[test]
    fn too_short_gives_no_windows() {
        assert!(create_windows(399, &config(300, 100, 50)).unwrap().is_empty());
        assert!(create_windows(0, &config(300, 100, 50)).unwrap().is_empty());
    }

    #[test]
    fn zero_lengths_are_rejected() {
        for cfg in [config(0, 100, 50), config(300, 0, 50), config(300, 100, 0)] {
            assert!(matches!(
                create_windows(1000, &cfg),
                Err(WalkForwardError::InvalidWindowConfig { .. })
            ));
        }
    }

    #[test]
    fn non_positive_capital_is_rejected() {
        let cfg = WalkForwardConfig {
            initial_capital: 0.0,
            ..config(300, 100, 50)
        };
        assert!(matches!(
            create_windows(1000, &cfg),
            Err(WalkForwardError::InvalidCapital { .. })
        ));
    }

    #[test]
    fn defaults() {
        let cfg = WalkForwardConfig::default();
        assert_eq!(
            (cfg.in_sample_len, cfg.out_sample_len, cfg.step_len),
            (10_000, 5_000, 2_500)
        );
        assert!(cfg.parallel);
    }

    #[test]
    fn grid_values_override_base_params() {
        let base = ParamSet::new()
            .with("risk_per_trade", 0.02)
            .with("use_trailing_stop", 0.0);
        let combo = ParamSet::new().with("risk_per_trade", 0.01);
        let merged = overlay(&base, &combo);
        assert_eq!(merged.get("risk_per_trade"), Some(0.01));
        assert_eq!(merged.get("use_trailing_stop"), Some(0.0));
        assert_eq!(merged.len(), 2);
    }

    // ─── Summary tests ───────────────────────────────────────────

    #[test]
    fn summary_of_nothing_is_zero() {
        assert_eq!(summarize(&[], 100_000.0), WalkForwardSummary::default());
    }
}
