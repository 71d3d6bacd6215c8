//! Instrument specification used for PnL scaling and price rounding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InstrumentError {
    #[error("tick_size must be positive, got {0}")]
    InvalidTickSize(f64),

    #[error("point_value must be positive, got {0}")]
    InvalidPointValue(f64),

    #[error("unknown instrument preset '{0}' (expected one of NQ, ES, EURUSD)")]
    UnknownPreset(String),
}

/// Contract metadata: minimum price increment and currency value of one point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub tick_size: f64,
    pub point_value: f64,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        tick_size: f64,
        point_value: f64,
    ) -> Result<Self, InstrumentError> {
        let instrument = Self {
            symbol: symbol.into(),
            tick_size,
            point_value,
        };
        instrument.validate()?;
        Ok(instrument)
    }

    /// Built-in contract specs, looked up case-insensitively.
    pub fn preset(symbol: &str) -> Result<Self, InstrumentError> {
        match symbol.to_ascii_uppercase().as_str() {
            "NQ" => Ok(Self::nq()),
            "ES" => Ok(Self::es()),
            "EURUSD" => Ok(Self::eurusd()),
            _ => Err(InstrumentError::UnknownPreset(symbol.to_string())),
        }
    }

    /// E-mini Nasdaq-100 futures.
    pub fn nq() -> Self {
        Self {
            symbol: "NQ".into(),
            tick_size: 0.25,
            point_value: 20.0,
        }
    }

    /// E-mini S&P 500 futures.
    pub fn es() -> Self {
        Self {
            symbol: "ES".into(),
            tick_size: 0.25,
            point_value: 50.0,
        }
    }

    pub fn eurusd() -> Self {
        Self {
            symbol: "EURUSD".into(),
            tick_size: 0.00001,
            point_value: 10.0,
        }
    }

    pub fn validate(&self) -> Result<(), InstrumentError> {
        if !(self.tick_size.is_finite() && self.tick_size > 0.0) {
            return Err(InstrumentError::InvalidTickSize(self.tick_size));
        }
        if !(self.point_value.is_finite() && self.point_value > 0.0) {
            return Err(InstrumentError::InvalidPointValue(self.point_value));
        }
        Ok(())
    }

    /// Round a price to the nearest tick.
    pub fn round_to_tick(&self, price: f64) -> f64 {
        (price / self.tick_size).round() * self.tick_size
    }

    /// Currency value of a price move for `size` contracts.
    pub fn pnl(&self, price_change: f64, size: u32) -> f64 {
        price_change * f64::from(size) * self.point_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_contract_specs() {
        let nq = Instrument::preset("nq").unwrap();
        assert_eq!(nq.tick_size, 0.25);
        assert_eq!(nq.point_value, 20.0);
        assert_eq!(Instrument::preset("ES").unwrap().point_value, 50.0);
        assert_eq!(Instrument::preset("EURUSD").unwrap().tick_size, 0.00001);
    }

    #[test]
    fn unknown_preset_rejected() {
        assert_eq!(
            Instrument::preset("CL"),
            Err(InstrumentError::UnknownPreset("CL".into()))
        );
    }

    #[test]
    fn new_validates_fields() {
        assert!(Instrument::new("X", 0.0, 10.0).is_err());
        assert!(Instrument::new("X", 0.01, -1.0).is_err());
        assert!(Instrument::new("X", 0.01, 10.0).is_ok());
    }

    #[test]
    fn round_to_tick_nearest() {
        let nq = Instrument::nq();
        assert!((nq.round_to_tick(100.13) - 100.25).abs() < 1e-12);
        assert!((nq.round_to_tick(100.12) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn pnl_scales_by_size_and_point_value() {
        let es = Instrument::es();
        assert!((es.pnl(2.5, 3) - 375.0).abs() < 1e-12);
        assert!((es.pnl(-1.0, 1) + 50.0).abs() < 1e-12);
    }
}
