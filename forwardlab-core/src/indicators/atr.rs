//! Average True Range (ATR) and its rolling average.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); the first
//! bar has no previous close and uses high-low.
//! ATR is the simple rolling mean of TR over `period` bars.
//! Lookback: period - 1.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series from bars.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high - bar.low;
        let value = match i.checked_sub(1).map(|p| bars[p].close) {
            Some(pc) if !pc.is_nan() => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            _ => hl,
        };
        tr.push(value);
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&true_range(bars), self.period)
    }
}

/// Rolling mean of ATR, used as the volatility baseline.
/// Lookback: atr_period - 1 + window - 1.
#[derive(Debug, Clone)]
pub struct AtrAverage {
    atr: Atr,
    window: usize,
    name: String,
}

impl AtrAverage {
    pub fn new(atr_period: usize, window: usize) -> Self {
        assert!(window >= 1, "ATR average window must be >= 1");
        Self {
            atr: Atr::new(atr_period),
            window,
            name: format!("atr_{atr_period}_avg_{window}"),
        }
    }
}

impl Indicator for AtrAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.atr.lookback() + self.window - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&self.atr.compute(bars), self.window)
    }
}
