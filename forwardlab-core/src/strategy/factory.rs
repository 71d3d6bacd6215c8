//! Strategy construction from parameter sets.
//!
//! The walk-forward optimizer never holds a strategy across trials: it asks a
//! [`StrategyFactory`] for a fresh instance per parameter set.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::mean_reversion::{MeanReversion, MeanReversionParams};
use super::params::{ParamError, ParamSet};
use super::sma_cross::{SmaCross, SmaCrossParams};
use super::trend::{TrendCrossover, TrendParams};
use super::Strategy;
use crate::domain::Instrument;

/// Builds independent strategy instances from parameter sets.
pub trait StrategyFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Every parameter name `build` accepts.
    fn param_names(&self) -> &[&'static str];

    fn build(
        &self,
        params: &ParamSet,
        instrument: &Instrument,
    ) -> Result<Box<dyn Strategy>, ParamError>;
}

/// The built-in rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TrendCrossover,
    MeanReversion,
    SmaCross,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::TrendCrossover,
        StrategyKind::MeanReversion,
        StrategyKind::SmaCross,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrendCrossover => TrendCrossover::NAME,
            StrategyKind::MeanReversion => MeanReversion::NAME,
            StrategyKind::SmaCross => SmaCross::NAME,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StrategyFactory for StrategyKind {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn param_names(&self) -> &[&'static str] {
        match self {
            StrategyKind::TrendCrossover => &TrendParams::PARAM_NAMES,
            StrategyKind::MeanReversion => &MeanReversionParams::PARAM_NAMES,
            StrategyKind::SmaCross => &SmaCrossParams::PARAM_NAMES,
        }
    }

    fn build(
        &self,
        params: &ParamSet,
        instrument: &Instrument,
    ) -> Result<Box<dyn Strategy>, ParamError> {
        let point_value = instrument.point_value;
        Ok(match self {
            StrategyKind::TrendCrossover => Box::new(TrendCrossover::new(
                TrendParams::from_params(params)?,
                point_value,
            )),
            StrategyKind::MeanReversion => Box::new(MeanReversion::new(
                MeanReversionParams::from_params(params)?,
                point_value,
            )),
            StrategyKind::SmaCross => Box::new(SmaCross::new(
                SmaCrossParams::from_params(params)?,
                point_value,
            )),
        })
    }
}
