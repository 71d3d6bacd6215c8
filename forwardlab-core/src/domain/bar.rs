//! Bar — the fundamental market data unit, plus the validated series wrapper.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// OHLCV bar for the traded instrument over one fixed interval.
///
/// Indicator values are precomputed by the data pipeline and attached by name.
/// Warm-up bars may carry `NaN` for an indicator; [`Bar::indicator`] reports
/// those as undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: BTreeMap::new(),
        }
    }

    /// Value of a named indicator, or `None` when missing or still warming up.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators
            .get(name)
            .copied()
            .filter(|v| v.is_finite())
    }

    pub fn set_indicator(&mut self, name: impl Into<String>, value: f64) {
        self.indicators.insert(name.into(), value);
    }

    /// Builder-style variant of [`Bar::set_indicator`].
    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_indicator(name, value);
        self
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.low > 0.0
    }

    /// Position of the close inside the bar's range (0 = low, 1 = high).
    ///
    /// A zero-width bar reports 0.5.
    pub fn close_location(&self) -> f64 {
        let range = self.high - self.low;
        if range <= 0.0 {
            0.5
        } else {
            (self.close - self.low) / range
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("timestamps not strictly increasing at bar {index}")]
    NonMonotonic { index: usize },

    #[error("invalid OHLC prices at bar {index}")]
    InvalidPrice { index: usize },
}

/// An ordered, validated sequence of bars.
///
/// Construction guarantees a non-empty series with strictly increasing
/// timestamps and sane, positive OHLC prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        if bars.is_empty() {
            return Err(BarError::EmptySeries);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(BarError::InvalidPrice { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(BarError::NonMonotonic { index });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Half-open slice `[start, end)`, clamped to the series bounds.
    pub fn slice(&self, start: usize, end: usize) -> &[Bar] {
        let end = end.min(self.bars.len());
        let start = start.min(end);
        &self.bars[start..end]
    }

    pub fn into_inner(self) -> Vec<Bar> {
        self.bars
    }
}

impl AsRef<[Bar]> for BarSeries {
    fn as_ref(&self) -> &[Bar] {
        &self.bars
    }
}
