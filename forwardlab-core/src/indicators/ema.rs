//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], with
//! alpha = 2 / (period + 1). Seeded from the first close (no SMA seed), so
//! the series is defined from bar 0.
//! Lookback: 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        let alpha = 2.0 / (self.period as f64 + 1.0);

        let mut prev: Option<f64> = None;
        for (i, bar) in bars.iter().enumerate() {
            if bar.close.is_nan() {
                // NaN taints everything after it
                return result;
            }
            let ema = match prev {
                None => bar.close,
                Some(p) => alpha * bar.close + (1.0 - alpha) * p,
            };
            result[i] = ema;
            prev = Some(ema);
        }

        result
    }
}
