//! Bar-by-bar event loop — the heart of the backtesting engine.

use tracing::{debug, trace};

use crate::domain::{Bar, ExitReason, Position};
use crate::strategy::{ExitSignal, History, Strategy};

use super::state::{EngineConfig, EngineError, EngineState, RunResult};

/// Run a backtest of `strategy` over `bars`.
///
/// `bars` must be in ascending time order and longer than the strategy's
/// warm-up. The strategy only ever sees `bars[0..=i]` while bar `i` is
/// processed. Entries are not evaluated on the final bar, since that position
/// would be closed on the bar it opened.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &dyn Strategy,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    let warmup = strategy.warmup();
    if bars.len() <= warmup {
        return Err(EngineError::InsufficientData {
            bars: bars.len(),
            warmup,
        });
    }
    let capital = config.initial_capital;
    if !(capital.is_finite() && capital > 0.0) {
        return Err(EngineError::InvalidCapital { capital });
    }
    config.instrument.validate()?;

    let point_value = config.instrument.point_value;
    let last = bars.len() - 1;
    let mut state = EngineState::new(capital, bars.len());

    for (t, bar) in bars.iter().enumerate() {
        state.record_equity(t, bar.timestamp);
        let history = History::new(bars, t);

        if let Some(position) = state.position.as_mut() {
            position.mark(bar.close, point_value);
            if let Some(signal) = strategy.should_exit(&history, position) {
                let price = resolve_exit_price(&signal, position, bar);
                if let Some(trade) =
                    state.close(t, bar.timestamp, price, signal.reason, point_value)
                {
                    debug!(
                        bar = t,
                        reason = %trade.exit_reason,
                        price = trade.exit_price,
                        pnl = trade.pnl,
                        "exit"
                    );
                }
            }
        } else if t < last && strategy.should_enter(&history) {
            let position = build_position(strategy, &history, state.account_value)?;
            debug!(
                bar = t,
                price = position.entry_price,
                size = position.size,
                stop = position.stop_loss,
                "entry"
            );
            state.open(position);
        }
    }

    if state.position.is_some() {
        let bar = &bars[last];
        state.close(last, bar.timestamp, bar.close, ExitReason::EndOfData, point_value);
    }

    let result = state.into_result(capital);
    trace!(
        strategy = strategy.name(),
        bars = result.bar_count,
        trades = result.trades.len(),
        final_equity = result.final_equity,
        "backtest complete"
    );
    Ok(result)
}

/// Fill price for an exit: stops and targets fill at their stored level,
/// other reasons at the strategy's price or the bar close.
fn resolve_exit_price(signal: &ExitSignal, position: &Position, bar: &Bar) -> f64 {
    match signal.reason {
        ExitReason::StopLoss => position.stop_loss,
        ExitReason::TakeProfit => position.take_profit.unwrap_or(bar.close),
        ExitReason::EndOfData => bar.close,
        _ => signal
            .price
            .filter(|p| p.is_finite())
            .unwrap_or(bar.close),
    }
}

/// Size and protect a new position at the current close.
fn build_position(
    strategy: &dyn Strategy,
    history: &History<'_>,
    account_value: f64,
) -> Result<Position, EngineError> {
    let bar = history.current();
    let bar_index = history.index();
    let entry_price = bar.close;
    let invalid = |reason: String| EngineError::InvalidPosition { bar_index, reason };

    let size = strategy.size_position(history, account_value);
    if size == 0 {
        return Err(invalid("position size is zero".into()));
    }

    let levels = strategy.protective_levels(history, entry_price);
    let stop_loss = match levels.stop_loss {
        Some(stop) if stop.is_finite() && stop < entry_price => stop,
        Some(stop) => {
            return Err(invalid(format!(
                "stop-loss {stop} is not below entry price {entry_price}"
            )))
        }
        None => return Err(invalid("no stop-loss supplied".into())),
    };

    Ok(Position {
        entry_bar: bar_index,
        entry_time: bar.timestamp,
        entry_price,
        size,
        stop_loss,
        take_profit: levels.take_profit.filter(|tp| tp.is_finite()),
        entry_equity: account_value,
        peak_profit: 0.0,
    })
}
