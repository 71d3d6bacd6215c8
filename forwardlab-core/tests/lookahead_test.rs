//! Look-ahead contamination tests.
//!
//! Invariant: nothing computed for bar t may depend on bars t+1 or later.
//!
//! Method: compute on a truncated series and on the full series, then assert
//! the overlapping prefix is identical. Indicators compare values, strategies
//! compare decisions, the engine compares closed trades.

use chrono::{Duration, NaiveDate};
use forwardlab_core::domain::{Bar, ExitReason, Instrument, Position};
use forwardlab_core::engine::{run_backtest, EngineConfig};
use forwardlab_core::indicators::*;
use forwardlab_core::strategy::{
    History, ParamSet, StrategyFactory, StrategyKind,
};

/// Generate N bars of synthetic OHLCV data with realistic variation.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 1_000.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG, plus a slow cycle
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0;
        price += change * 2.0 + (i as f64 / 40.0).sin();
        price = price.max(100.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(Bar::new(
            base + Duration::minutes(5 * i as i64),
            open,
            open.max(close) + 2.0,
            open.min(close) - 2.0,
            close,
            1_000.0 + i as f64,
        ));
    }

    bars
}

/// A two-frequency cycle with a long lower wick every ninth bar.
///
/// Every built-in strategy closes trades on it within the first 300 bars,
/// and the trend strategy reaches both its trailing stop and its
/// opposite-crossover exit there.
fn make_cycle_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let close_at = |t: usize| {
        let t = t as f64;
        1_000.0 + 0.1 * t + 15.0 * (t / 40.0).sin() + 6.0 * (t / 5.0).sin()
    };

    (0..n)
        .map(|i| {
            let close = close_at(i);
            let open = if i == 0 { close } else { close_at(i - 1) };
            let wick = if i % 9 == 8 { 5.0 } else { 1.0 };
            Bar::new(
                base + Duration::minutes(5 * i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - wick,
                close,
                1_000.0 + i as f64,
            )
        })
        .collect()
}

/// Parameters per kind for the cycle data. The wide trend target leaves
/// room for the trailing stop to fire first.
fn cycle_params(kind: StrategyKind) -> ParamSet {
    match kind {
        StrategyKind::TrendCrossover => ParamSet::new().with("reward_risk_ratio", 10.0),
        _ => ParamSet::new(),
    }
}

fn with_indicators(bars: &[Bar]) -> Vec<Bar> {
    let mut out = bars.to_vec();
    attach_indicators(&mut out, &standard_set());
    out
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[Bar], truncated_len: usize) {
    let full = indicator.compute(full_bars);
    let truncated = indicator.compute(&full_bars[..truncated_len]);
    assert_eq!(truncated.len(), truncated_len, "{}", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated[i], full[i]);
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            (t - f).abs() < 1e-9,
            "{}: look-ahead at bar {i} (truncated={t}, full={f})",
            indicator.name()
        );
    }
}

#[test]
fn standard_indicators_are_truncation_invariant() {
    let bars = make_test_bars(400);
    for indicator in standard_set() {
        for truncated_len in [1, 13, 14, 63, 200, 399] {
            assert_no_lookahead(indicator.as_ref(), &bars, truncated_len);
        }
    }
}

#[test]
fn strategy_decisions_match_on_truncated_history() {
    let raw = make_test_bars(600);
    let full = with_indicators(&raw);
    let truncated = with_indicators(&raw[..350]);
    let instrument = Instrument::nq();

    for kind in StrategyKind::ALL {
        let strategy = kind.build(&ParamSet::new(), &instrument).unwrap();
        for i in 0..truncated.len() {
            assert_eq!(
                strategy.should_enter(&History::new(&full, i)),
                strategy.should_enter(&History::new(&truncated, i)),
                "{kind}: entry decision differs at bar {i}"
            );
        }
    }
}

#[test]
fn engine_trades_are_a_prefix_of_the_full_run() {
    let raw = make_test_bars(1_200);
    let full_bars = with_indicators(&raw);
    let instrument = Instrument::nq();
    let config = EngineConfig::new(100_000.0, instrument.clone());

    for kind in StrategyKind::ALL {
        let strategy = kind.build(&ParamSet::new(), &instrument).unwrap();
        let full = run_backtest(&full_bars, strategy.as_ref(), &config).unwrap();

        for cut in [300, 640, 900] {
            let truncated_bars = with_indicators(&raw[..cut]);
            let partial = run_backtest(&truncated_bars, strategy.as_ref(), &config).unwrap();

            let closed: Vec<_> = partial
                .trades
                .iter()
                .filter(|t| t.exit_reason != ExitReason::EndOfData)
                .collect();
            assert!(closed.len() <= full.trades.len(), "{kind} cut={cut}");
            for (a, b) in closed.iter().zip(&full.trades) {
                assert_eq!(*a, b, "{kind}: trade differs with cut={cut}");
            }

            // equity curve agrees bar for bar over the shared range
            assert_eq!(
                partial.equity_curve[..],
                full.equity_curve[..cut],
                "{kind} cut={cut}"
            );
        }
    }
}

#[test]
fn exit_decisions_match_on_truncated_history() {
    const CUT: usize = 300;
    let raw = make_cycle_bars(900);
    let full = with_indicators(&raw);
    let truncated = with_indicators(&raw[..CUT]);
    let instrument = Instrument::nq();

    for kind in StrategyKind::ALL {
        let strategy = kind.build(&cycle_params(kind), &instrument).unwrap();

        let entry_bar = (0..CUT)
            .find(|&i| strategy.should_enter(&History::new(&truncated, i)))
            .unwrap_or_else(|| panic!("{kind}: no entry before bar {CUT}"));
        let entry = History::new(&truncated, entry_bar);
        let entry_price = entry.current().close;
        let levels = strategy.protective_levels(&entry, entry_price);

        // Held open to the cut regardless of exit signals.
        let mut position = Position {
            entry_bar,
            entry_time: entry.current().timestamp,
            entry_price,
            size: strategy.size_position(&entry, 100_000.0),
            stop_loss: levels.stop_loss.unwrap(),
            take_profit: levels.take_profit,
            entry_equity: 100_000.0,
            peak_profit: 0.0,
        };

        let mut signals = 0;
        for i in entry_bar + 1..CUT {
            position.mark(truncated[i].close, instrument.point_value);
            let expected = strategy.should_exit(&History::new(&full, i), &position);
            let actual = strategy.should_exit(&History::new(&truncated, i), &position);
            assert_eq!(actual, expected, "{kind}: exit decision differs at bar {i}");
            signals += usize::from(actual.is_some());
        }
        assert!(signals > 0, "{kind}: held position never saw an exit signal");
    }
}

#[test]
fn cycle_trades_close_before_the_cut_and_survive_it() {
    const CUT: usize = 300;
    let raw = make_cycle_bars(900);
    let full_bars = with_indicators(&raw);
    let truncated_bars = with_indicators(&raw[..CUT]);
    let instrument = Instrument::nq();
    let config = EngineConfig::new(100_000.0, instrument.clone());

    for kind in StrategyKind::ALL {
        let strategy = kind.build(&cycle_params(kind), &instrument).unwrap();
        let full = run_backtest(&full_bars, strategy.as_ref(), &config).unwrap();
        let partial = run_backtest(&truncated_bars, strategy.as_ref(), &config).unwrap();

        let closed: Vec<_> = partial
            .trades
            .iter()
            .filter(|t| t.exit_reason != ExitReason::EndOfData)
            .collect();
        assert!(!closed.is_empty(), "{kind}: no trade closed before bar {CUT}");
        for (a, b) in closed.iter().zip(&full.trades) {
            assert_eq!(*a, b, "{kind}: trade differs with cut={CUT}");
        }

        if kind == StrategyKind::TrendCrossover {
            for reason in [ExitReason::TrailingStop, ExitReason::OppositeCrossover] {
                assert!(
                    closed.iter().any(|t| t.exit_reason == reason),
                    "trend: no {reason:?} exit before bar {CUT}"
                );
            }
        }
    }
}
