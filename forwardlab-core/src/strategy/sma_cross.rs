//! SMA 20/50 golden-cross trend strategy.
//!
//! Enters on a golden cross confirmed by a close above both averages; exits
//! on the optional stop or target, on the death cross, or on any close
//! under SMA 50.

use serde::{Deserialize, Serialize};

use super::params::{flag, ParamError, ParamSet};
use super::{crossed_above, crossed_below, ExitSignal, History, ProtectiveLevels, RiskModel, Strategy};
use crate::domain::{ExitReason, Position};
use crate::indicators::names;

/// Slow period plus a short settling margin.
const WARMUP_BARS: usize = 55;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaCrossParams {
    #[serde(flatten)]
    pub risk: RiskModel,
    pub exit_on_cross: bool,
    pub use_stop_loss: bool,
    pub use_take_profit: bool,
}

impl Default for SmaCrossParams {
    fn default() -> Self {
        Self {
            risk: RiskModel::new(0.015, 3.0, 4.0),
            exit_on_cross: true,
            use_stop_loss: true,
            use_take_profit: false,
        }
    }
}

impl SmaCrossParams {
    pub const PARAM_NAMES: [&'static str; 6] = [
        "risk_per_trade",
        "atr_stop_multiplier",
        "reward_risk_ratio",
        "exit_on_cross",
        "use_stop_loss",
        "use_take_profit",
    ];

    pub fn from_params(params: &ParamSet) -> Result<Self, ParamError> {
        let mut p = Self::default();
        for (name, value) in params.iter() {
            if p.risk.apply(name, value)? {
                continue;
            }
            match name {
                "exit_on_cross" => p.exit_on_cross = flag(value),
                "use_stop_loss" => p.use_stop_loss = flag(value),
                "use_take_profit" => p.use_take_profit = flag(value),
                _ => {
                    return Err(ParamError::UnknownParam {
                        strategy: SmaCross::NAME.into(),
                        name: name.into(),
                    })
                }
            }
        }
        Ok(p)
    }
}

#[derive(Debug, Clone)]
pub struct SmaCross {
    params: SmaCrossParams,
    point_value: f64,
}

impl SmaCross {
    pub const NAME: &'static str = "sma_cross";

    pub fn new(params: SmaCrossParams, point_value: f64) -> Self {
        Self {
            params,
            point_value,
        }
    }
}

impl Strategy for SmaCross {
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
        let (Some(fast), Some(slow)) = (
            bar.indicator(names::SMA_FAST),
            bar.indicator(names::SMA_SLOW),
        ) else {
            return false;
        };
        crossed_above(history, names::SMA_FAST, names::SMA_SLOW)
            && bar.close > fast
            && bar.close > slow
    }

    fn should_exit(&self, history: &History<'_>, position: &Position) -> Option<ExitSignal> {
        let bar = history.current();

        if self.params.use_stop_loss && bar.low <= position.stop_loss {
            return Some(ExitSignal::new(ExitReason::StopLoss));
        }
        if self.params.use_take_profit && position.take_profit.is_some_and(|tp| bar.high >= tp) {
            return Some(ExitSignal::new(ExitReason::TakeProfit));
        }
        if self.params.exit_on_cross && crossed_below(history, names::SMA_FAST, names::SMA_SLOW) {
            return Some(ExitSignal::new(ExitReason::DeathCross));
        }
        if bar
            .indicator(names::SMA_SLOW)
            .is_some_and(|slow| bar.close < slow)
        {
            return Some(ExitSignal::new(ExitReason::SmaBreakdown));
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
