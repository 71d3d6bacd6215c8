//! Mean-reversion pullback strategy.
//!
//! Buys oversold dips inside an uptrend: close above SMA 50, pulled back to
//! (but not more than two ATRs under) EMA 21, RSI below `rsi_oversold`, and a
//! reversal bar (higher close, or close in the top 40% of the range).
//! Exits on the stop, on a tag of EMA 9, on the optional fixed target, when
//! RSI turns overbought, or when the close breaks an ATR under EMA 21.

use serde::{Deserialize, Serialize};

use super::params::{bounded, flag, ParamError, ParamSet};
use super::{ExitSignal, History, ProtectiveLevels, RiskModel, Strategy};
use crate::domain::{ExitReason, Position};
use crate::indicators::names;

const WARMUP_BARS: usize = 60;
const MAX_PULLBACK_ATR: f64 = 2.0;
const REVERSAL_CLOSE_LOCATION: f64 = 0.6;
const OVERBOUGHT_RSI: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanReversionParams {
    #[serde(flatten)]
    pub risk: RiskModel,
    pub rsi_oversold: f64,
    pub use_ema_target: bool,
    pub use_fixed_target: bool,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            risk: RiskModel::new(0.02, 2.0, 2.0),
            rsi_oversold: 40.0,
            use_ema_target: true,
            use_fixed_target: false,
        }
    }
}

impl MeanReversionParams {
    pub const PARAM_NAMES: [&'static str; 6] = [
        "risk_per_trade",
        "atr_stop_multiplier",
        "reward_risk_ratio",
        "rsi_oversold",
        "use_ema_target",
        "use_fixed_target",
    ];

    pub fn from_params(params: &ParamSet) -> Result<Self, ParamError> {
        let mut p = Self::default();
        for (name, value) in params.iter() {
            if p.risk.apply(name, value)? {
                continue;
            }
            match name {
                "rsi_oversold" => p.rsi_oversold = bounded(name, value, 0.0, 100.0)?,
                "use_ema_target" => p.use_ema_target = flag(value),
                "use_fixed_target" => p.use_fixed_target = flag(value),
                _ => {
                    return Err(ParamError::UnknownParam {
                        strategy: MeanReversion::NAME.into(),
                        name: name.into(),
                    })
                }
            }
        }
        Ok(p)
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
    point_value: f64,
}

impl MeanReversion {
    pub const NAME: &'static str = "mean_reversion";

    pub fn new(params: MeanReversionParams, point_value: f64) -> Self {
        Self {
            params,
            point_value,
        }
    }
}

impl Strategy for MeanReversion {
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
        let (Some(_), Some(ema_slow), Some(sma_slow), Some(atr), Some(rsi)) = (
            bar.indicator(names::EMA_FAST),
            bar.indicator(names::EMA_SLOW),
            bar.indicator(names::SMA_SLOW),
            bar.indicator(names::ATR),
            bar.indicator(names::RSI),
        ) else {
            return false;
        };

        let in_uptrend = bar.close > sma_slow;
        let pulled_back =
            bar.close <= ema_slow && bar.close > ema_slow - MAX_PULLBACK_ATR * atr;
        let oversold = rsi < self.params.rsi_oversold;
        let reversal = history.previous().is_some_and(|p| bar.close > p.close)
            || bar.close_location() > REVERSAL_CLOSE_LOCATION;

        in_uptrend && pulled_back && oversold && reversal
    }

    fn should_exit(&self, history: &History<'_>, position: &Position) -> Option<ExitSignal> {
        let bar = history.current();

        if bar.low <= position.stop_loss {
            return Some(ExitSignal::new(ExitReason::StopLoss));
        }
        if self.params.use_ema_target
            && bar
                .indicator(names::EMA_FAST)
                .is_some_and(|ema| bar.high >= ema)
        {
            return Some(ExitSignal::new(ExitReason::EmaTarget));
        }
        if self.params.use_fixed_target && position.take_profit.is_some_and(|tp| bar.high >= tp) {
            return Some(ExitSignal::new(ExitReason::TakeProfit));
        }
        if bar.indicator(names::RSI).is_some_and(|rsi| rsi > OVERBOUGHT_RSI) {
            return Some(ExitSignal::new(ExitReason::Overbought));
        }
        if let (Some(ema_slow), Some(atr)) =
            (bar.indicator(names::EMA_SLOW), bar.indicator(names::ATR))
        {
            if bar.close < ema_slow - atr {
                return Some(ExitSignal::new(ExitReason::Breakdown));
            }
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
