//! Indicator precomputation.
//!
//! Indicators are pure functions: bar history in, numeric series out. They are
//! computed once over the full series by the data pipeline and attached to each
//! bar by name, so strategies only ever read values already on the bars they
//! can see.
//!
//! # Look-ahead contamination guard
//! No indicator value at bar t may depend on price data from bar t+1 or later.
//! Every indicator must pass the truncated-vs-full series test.

pub mod atr;
pub mod ema;
pub mod momentum;
pub mod rsi;
pub mod sma;

pub use atr::{Atr, AtrAverage};
pub use ema::Ema;
pub use momentum::Momentum;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Bar;

/// Column names of the standard indicator set.
pub mod names {
    pub const ATR: &str = "atr_14";
    pub const ATR_AVG: &str = "atr_avg";
    pub const EMA_FAST: &str = "ema_9";
    pub const EMA_SLOW: &str = "ema_21";
    pub const SMA_FAST: &str = "sma_20";
    pub const SMA_SLOW: &str = "sma_50";
    pub const RSI: &str = "rsi";
    pub const MOMENTUM: &str = "momentum_10";
}

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
pub trait Indicator: Send + Sync {
    /// Column name the values are attached under (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Wraps an indicator to attach its values under a different column name.
#[derive(Debug, Clone)]
pub struct Named<I> {
    name: String,
    inner: I,
}

impl<I: Indicator> Named<I> {
    pub fn new(name: impl Into<String>, inner: I) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<I: Indicator> Indicator for Named<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.inner.lookback()
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.inner.compute(bars)
    }
}

/// The indicator columns every built-in strategy reads.
pub fn standard_set() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(Atr::new(14)),
        Box::new(Named::new(names::ATR_AVG, AtrAverage::new(14, 50))),
        Box::new(Ema::new(9)),
        Box::new(Ema::new(21)),
        Box::new(Sma::new(20)),
        Box::new(Sma::new(50)),
        Box::new(Named::new(names::RSI, Rsi::new(14))),
        Box::new(Momentum::new(10)),
    ]
}

/// Largest lookback across a set of indicators.
pub fn max_lookback(indicators: &[Box<dyn Indicator>]) -> usize {
    indicators.iter().map(|i| i.lookback()).max().unwrap_or(0)
}

/// Compute every indicator over `bars` and store the values on each bar.
pub fn attach_indicators(bars: &mut [Bar], indicators: &[Box<dyn Indicator>]) {
    let computed: Vec<(String, Vec<f64>)> = indicators
        .iter()
        .map(|ind| (ind.name().to_string(), ind.compute(bars)))
        .collect();

    for (name, values) in computed {
        for (bar, value) in bars.iter_mut().zip(values) {
            bar.set_indicator(name.clone(), value);
        }
    }
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar::new(
                base + chrono::Duration::minutes(5 * i as i64),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_column_names() {
        let set = standard_set();
        let got: Vec<&str> = set.iter().map(|i| i.name()).collect();
        assert_eq!(
            got,
            vec![
                names::ATR,
                names::ATR_AVG,
                names::EMA_FAST,
                names::EMA_SLOW,
                names::SMA_FAST,
                names::SMA_SLOW,
                names::RSI,
                names::MOMENTUM,
            ]
        );
    }

    #[test]
    fn attach_writes_every_column() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut bars = make_bars(&closes);
        let set = standard_set();
        attach_indicators(&mut bars, &set);

        for bar in &bars {
            assert_eq!(bar.indicators.len(), set.len());
        }
        // atr_avg needs 14 + 50 - 1 bars of history
        assert_eq!(bars[61].indicator(names::ATR_AVG), None);
        assert!(bars[62].indicator(names::ATR_AVG).is_some());
        assert!(bars[79].indicator(names::SMA_SLOW).is_some());
    }

    #[test]
    fn named_overrides_column_only() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let plain = Sma::new(2);
        let named = Named::new("fast", Sma::new(2));
        assert_eq!(named.name(), "fast");
        assert_eq!(named.lookback(), plain.lookback());
        let a = plain.compute(&bars);
        let b = named.compute(&bars);
        assert!(a[0].is_nan() && b[0].is_nan());
        assert_eq!(&a[1..], &b[1..]);
    }

    #[test]
    fn max_lookback_of_standard_set() {
        assert_eq!(max_lookback(&standard_set()), 62);
    }
}
