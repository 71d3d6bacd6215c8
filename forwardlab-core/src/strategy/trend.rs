//! 9/21 EMA crossover trend strategy with confirmation filters.
//!
//! Entry (long only) requires a bullish EMA crossover within the last six
//! bars plus every enabled filter:
//! - trend: close and EMA 21 above SMA 50
//! - volatility: ATR at least `min_atr_multiplier` × its rolling average
//! - momentum: 10-bar momentum positive and rising
//! - EMA slope: both EMAs rising
//! - pullback: within `pullback_lookback` bars, a low under EMA 9 or a lower close
//!
//! and finally a close above both EMAs, within two ATRs of EMA 9, with the
//! EMAs at least 0.1 ATR apart.
//!
//! Exits in priority order: stop-loss, take-profit, ATR trailing stop (armed
//! once peak profit exceeds `trailing_stop_activation` × initial risk),
//! bearish crossover.

use serde::{Deserialize, Serialize};

use super::params::{flag, positive, whole, ParamError, ParamSet};
use super::{crossed_below, ExitSignal, History, ProtectiveLevels, RiskModel, Strategy};
use crate::domain::{ExitReason, Position};
use crate::indicators::names;

const WARMUP_BARS: usize = 60;
const CROSSOVER_LOOKBACK: usize = 6;
const MAX_EXTENSION_ATR: f64 = 2.0;
const MIN_SEPARATION_ATR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    #[serde(flatten)]
    pub risk: RiskModel,
    pub use_trend_filter: bool,
    pub use_volatility_filter: bool,
    pub use_momentum_filter: bool,
    pub use_ema_slope_filter: bool,
    pub use_pullback_filter: bool,
    pub min_atr_multiplier: f64,
    pub pullback_lookback: usize,
    pub use_trailing_stop: bool,
    pub trailing_stop_activation: f64,
    /// Trailing distance in ATRs below the close.
    pub trailing_stop_distance: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            risk: RiskModel::new(0.005, 2.5, 1.5),
            use_trend_filter: true,
            use_volatility_filter: true,
            use_momentum_filter: true,
            use_ema_slope_filter: true,
            use_pullback_filter: true,
            min_atr_multiplier: 1.0,
            pullback_lookback: 3,
            use_trailing_stop: true,
            trailing_stop_activation: 1.2,
            trailing_stop_distance: 1.2,
        }
    }
}

impl TrendParams {
    pub const PARAM_NAMES: [&'static str; 13] = [
        "risk_per_trade",
        "atr_stop_multiplier",
        "reward_risk_ratio",
        "use_trend_filter",
        "use_volatility_filter",
        "use_momentum_filter",
        "use_ema_slope_filter",
        "use_pullback_filter",
        "min_atr_multiplier",
        "pullback_lookback",
        "use_trailing_stop",
        "trailing_stop_activation",
        "trailing_stop_distance",
    ];

    /// Defaults overridden by `params`.
    pub fn from_params(params: &ParamSet) -> Result<Self, ParamError> {
        let mut p = Self::default();
        for (name, value) in params.iter() {
            if p.risk.apply(name, value)? {
                continue;
            }
            match name {
                "use_trend_filter" => p.use_trend_filter = flag(value),
                "use_volatility_filter" => p.use_volatility_filter = flag(value),
                "use_momentum_filter" => p.use_momentum_filter = flag(value),
                "use_ema_slope_filter" => p.use_ema_slope_filter = flag(value),
                "use_pullback_filter" => p.use_pullback_filter = flag(value),
                "min_atr_multiplier" => p.min_atr_multiplier = positive(name, value)?,
                "pullback_lookback" => p.pullback_lookback = whole(name, value)?,
                "use_trailing_stop" => p.use_trailing_stop = flag(value),
                "trailing_stop_activation" => p.trailing_stop_activation = positive(name, value)?,
                "trailing_stop_distance" => p.trailing_stop_distance = positive(name, value)?,
                _ => {
                    return Err(ParamError::UnknownParam {
                        strategy: TrendCrossover::NAME.into(),
                        name: name.into(),
                    })
                }
            }
        }
        Ok(p)
    }
}

#[derive(Debug, Clone)]
pub struct TrendCrossover {
    params: TrendParams,
    point_value: f64,
}

impl TrendCrossover {
    pub const NAME: &'static str = "trend_crossover";

    pub fn new(params: TrendParams, point_value: f64) -> Self {
        Self {
            params,
            point_value,
        }
    }

    pub fn params(&self) -> &TrendParams {
        &self.params
    }

    fn recent_crossover(history: &History<'_>) -> bool {
        for k in 0..CROSSOVER_LOOKBACK {
            let (Some(bar), Some(before)) = (history.back(k), history.back(k + 1)) else {
                break;
            };
            let values = (
                bar.indicator(names::EMA_FAST),
                bar.indicator(names::EMA_SLOW),
                before.indicator(names::EMA_FAST),
                before.indicator(names::EMA_SLOW),
            );
            if let (Some(fast), Some(slow), Some(fast_before), Some(slow_before)) = values {
                if fast_before <= slow_before && fast > slow {
                    return true;
                }
            }
        }
        false
    }

    fn had_pullback(&self, history: &History<'_>) -> bool {
        for k in 1..=self.params.pullback_lookback {
            let Some(past) = history.back(k) else {
                break;
            };
            let below_fast_ema = past
                .indicator(names::EMA_FAST)
                .is_some_and(|ema| past.low < ema);
            let lower_close = history.back(k + 1).is_some_and(|b| past.close < b.close);
            if below_fast_ema || lower_close {
                return true;
            }
        }
        false
    }

    fn momentum_confirms(history: &History<'_>) -> bool {
        match history.indicator_pair(names::MOMENTUM) {
            Some((now, before)) => now > 0.0 && now > before,
            None => false,
        }
    }

    fn emas_rising(history: &History<'_>) -> bool {
        let fast = history.indicator_pair(names::EMA_FAST);
        let slow = history.indicator_pair(names::EMA_SLOW);
        matches!((fast, slow), (Some((f, fp)), Some((s, sp))) if f > fp && s > sp)
    }
}

impl Strategy for TrendCrossover {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn warmup(&self) -> usize {
        WARMUP_BARS
    }

    fn should_enter(&self, history: &History<'_>) -> bool {
        if history.index() < self.warmup() {
            return false;
        }
        let bar = history.current();
        let (Some(ema_fast), Some(ema_slow), Some(atr), Some(sma_slow), Some(atr_avg)) = (
            bar.indicator(names::EMA_FAST),
            bar.indicator(names::EMA_SLOW),
            bar.indicator(names::ATR),
            bar.indicator(names::SMA_SLOW),
            bar.indicator(names::ATR_AVG),
        ) else {
            return false;
        };

        if !(ema_fast > ema_slow && Self::recent_crossover(history)) {
            return false;
        }

        let p = &self.params;
        if p.use_trend_filter && !(bar.close > sma_slow && ema_slow > sma_slow) {
            return false;
        }
        if p.use_volatility_filter && atr < atr_avg * p.min_atr_multiplier {
            return false;
        }
        if p.use_momentum_filter && !Self::momentum_confirms(history) {
            return false;
        }
        if p.use_ema_slope_filter && !Self::emas_rising(history) {
            return false;
        }
        if p.use_pullback_filter && !self.had_pullback(history) {
            return false;
        }

        let above_emas = bar.close > ema_fast && bar.close > ema_slow;
        let not_extended = (bar.close - ema_fast) / atr < MAX_EXTENSION_ATR;
        let separated = (ema_fast - ema_slow) / atr > MIN_SEPARATION_ATR;
        above_emas && not_extended && separated
    }

    fn should_exit(&self, history: &History<'_>, position: &Position) -> Option<ExitSignal> {
        let bar = history.current();

        if bar.low <= position.stop_loss {
            return Some(ExitSignal::new(ExitReason::StopLoss));
        }
        if position.take_profit.is_some_and(|tp| bar.high >= tp) {
            return Some(ExitSignal::new(ExitReason::TakeProfit));
        }

        if self.params.use_trailing_stop {
            let armed = position.peak_profit
                > position.risk_amount(self.point_value) * self.params.trailing_stop_activation;
            if let (true, Some(atr)) = (armed, bar.indicator(names::ATR)) {
                let level = bar.close - atr * self.params.trailing_stop_distance;
                if level > position.stop_loss && bar.low <= level {
                    return Some(ExitSignal::at(ExitReason::TrailingStop, level));
                }
            }
        }

        if crossed_below(history, names::EMA_FAST, names::EMA_SLOW) {
            return Some(ExitSignal::new(ExitReason::OppositeCrossover));
        }
        None
    }

    fn size_position(&self, history: &History<'_>, account_value: f64) -> u32 {
        let atr = history.current().indicator(names::ATR);
        self.params
            .risk
            .position_size(atr, account_value, self.point_value)
    }

    fn protective_levels(&self, history: &History<'_>, entry_price: f64) -> ProtectiveLevels {
        self.params
            .risk
            .levels(history.current().indicator(names::ATR), entry_price)
    }
}
