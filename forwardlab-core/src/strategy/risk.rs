//! ATR risk model shared by every built-in strategy.
//!
//! ```text
//! stop_distance = atr_14 * atr_stop_multiplier
//! risk_amount   = account_value * risk_per_trade
//! size          = max(1, floor(risk_amount / (stop_distance * point_value)))
//! stop_loss     = entry - stop_distance
//! take_profit   = entry + stop_distance * reward_risk_ratio
//! ```

use serde::{Deserialize, Serialize};

use super::params::{fraction, positive, ParamError};
use super::ProtectiveLevels;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    /// Fraction of account value risked per trade (0.02 = 2%).
    pub risk_per_trade: f64,
    pub atr_stop_multiplier: f64,
    pub reward_risk_ratio: f64,
}

impl RiskModel {
    pub const PARAM_NAMES: [&'static str; 3] =
        ["risk_per_trade", "atr_stop_multiplier", "reward_risk_ratio"];

    pub fn new(risk_per_trade: f64, atr_stop_multiplier: f64, reward_risk_ratio: f64) -> Self {
        Self {
            risk_per_trade,
            atr_stop_multiplier,
            reward_risk_ratio,
        }
    }

    /// Apply one parameter if it belongs to the risk model.
    ///
    /// Returns `Ok(false)` when the name is not a risk parameter.
    pub fn apply(&mut self, name: &str, value: f64) -> Result<bool, ParamError> {
        match name {
            "risk_per_trade" => self.risk_per_trade = fraction(name, value)?,
            "atr_stop_multiplier" => self.atr_stop_multiplier = positive(name, value)?,
            "reward_risk_ratio" => self.reward_risk_ratio = positive(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn stop_distance(&self, atr: f64) -> f64 {
        atr * self.atr_stop_multiplier
    }

    /// Contracts to trade, never fewer than one.
    pub fn position_size(&self, atr: Option<f64>, account_value: f64, point_value: f64) -> u32 {
        let Some(atr) = atr else {
            return 1;
        };
        let per_contract_risk = self.stop_distance(atr) * point_value;
        if !(per_contract_risk.is_finite() && per_contract_risk > 0.0) {
            return 1;
        }
        let risk_amount = account_value * self.risk_per_trade;
        let contracts = (risk_amount / per_contract_risk).floor();
        if contracts.is_finite() && contracts >= 1.0 {
            // float-to-int `as` saturates at u32::MAX
            contracts as u32
        } else {
            1
        }
    }

    /// Stop and target around `entry_price`; both undefined without ATR.
    pub fn levels(&self, atr: Option<f64>, entry_price: f64) -> ProtectiveLevels {
        match atr {
            Some(atr) => {
                let distance = self.stop_distance(atr);
                ProtectiveLevels {
                    stop_loss: Some(entry_price - distance),
                    take_profit: Some(entry_price + distance * self.reward_risk_ratio),
                }
            }
            None => ProtectiveLevels::default(),
        }
    }
}
