//! Bar loading for the runner.
//!
//! Reads OHLCV bars from delimited text files, drops rows with missing
//! prices, rejects inconsistent or non-positive OHLC values, enforces strictly
//! increasing timestamps and attaches the standard indicator set. Column layout is either taken from a header row or given
//! explicitly, so header-less exports (e.g. tab-separated broker dumps with
//! `timestamp, close, high, low, open, volume` ordering) load as well.
//!
//! Synthetic data is a developer-only mode: a seeded random walk that is
//! tagged as synthetic in the returned [`LoadedData`].

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use forwardlab_core::domain::{Bar, BarError, BarSeries};
use forwardlab_core::indicators::{attach_indicators, max_lookback, standard_set};

/// Column order assumed when there is neither a header row nor an explicit layout.
pub const DEFAULT_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}, record {record}: cannot parse timestamp '{value}'", path.display())]
    BadTimestamp {
        path: PathBuf,
        record: usize,
        value: String,
    },

    #[error("timestamps not strictly increasing at bar {index} ({timestamp})")]
    NonMonotonic {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("{}: {source}", path.display())]
    InvalidBar {
        path: PathBuf,
        #[source]
        source: BarError,
    },

    #[error("{}: no usable bars", path.display())]
    Empty { path: PathBuf },
}

/// Options controlling how a file is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Column names in file order. Overrides the header row when set.
    pub columns: Option<Vec<String>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            columns: None,
        }
    }
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Bars with the standard indicators attached.
    pub bars: Vec<Bar>,
    /// BLAKE3 hash over timestamps and OHLCV values.
    pub dataset_hash: String,
    /// Rows dropped for missing or non-finite prices.
    pub dropped_rows: usize,
    pub is_synthetic: bool,
}

/// Column positions resolved from a header or explicit layout.
#[derive(Debug, Clone, Copy)]
struct Layout {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Layout {
    fn resolve<'a>(
        names: impl IntoIterator<Item = &'a str>,
        path: &Path,
    ) -> Result<Self, LoadError> {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.trim().to_ascii_lowercase())
            .collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: aliases[0].to_string(),
            })
        };
        Ok(Self {
            timestamp: require(&["timestamp", "datetime", "time", "date"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find(&["volume", "vol", "tick_volume"]),
        })
    }
}

/// Parse a timestamp in any of the accepted formats. Date-only values map to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_price(record: &csv::StringRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Load bars from a delimited file and attach the standard indicator set.
pub fn load_csv(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(opts.has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let layout = match &opts.columns {
        Some(columns) => Layout::resolve(columns.iter().map(String::as_str), path)?,
        None if opts.has_headers => {
            let headers = reader.headers().map_err(csv_err)?.clone();
            Layout::resolve(headers.iter(), path)?
        }
        None => Layout::resolve(DEFAULT_COLUMNS, path)?,
    };

    let mut bars: Vec<Bar> = Vec::new();
    let mut dropped_rows = 0;

    for (record_index, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let raw_ts = record.get(layout.timestamp).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            path: path.to_path_buf(),
            record: record_index,
            value: raw_ts.to_string(),
        })?;

        let prices = (
            parse_price(&record, layout.open),
            parse_price(&record, layout.high),
            parse_price(&record, layout.low),
            parse_price(&record, layout.close),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = prices else {
            dropped_rows += 1;
            continue;
        };
        let volume = layout
            .volume
            .and_then(|i| parse_price(&record, i))
            .unwrap_or(0.0);

        if let Some(prev) = bars.last() {
            if timestamp <= prev.timestamp {
                return Err(LoadError::NonMonotonic {
                    index: bars.len(),
                    timestamp,
                });
            }
        }
        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    if dropped_rows > 0 {
        warn!(path = %path.display(), dropped_rows, "dropped rows with missing prices");
    }

    let mut bars = BarSeries::new(bars)
        .map_err(|source| LoadError::InvalidBar {
            path: path.to_path_buf(),
            source,
        })?
        .into_inner();
    let dataset_hash = compute_dataset_hash(&bars);
    attach_standard(&mut bars);
    info!(
        path = %path.display(),
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "loaded bars"
    );

    Ok(LoadedData {
        bars,
        dataset_hash,
        dropped_rows,
        is_synthetic: false,
    })
}

/// Synthetic random-walk bars with the standard indicators attached.
pub fn load_synthetic(n: usize, seed: u64) -> LoadedData {
    warn!(bars = n, seed, "using synthetic data, results are not meaningful");
    let mut bars = generate_synthetic_bars(n, seed);
    let dataset_hash = compute_dataset_hash(&bars);
    attach_standard(&mut bars);
    LoadedData {
        bars,
        dataset_hash,
        dropped_rows: 0,
        is_synthetic: true,
    }
}

fn attach_standard(bars: &mut [Bar]) {
    let set = standard_set();
    let lookback = max_lookback(&set);
    if bars.len() <= lookback {
        warn!(
            bars = bars.len(),
            lookback,
            "series shorter than indicator warm-up, some columns stay undefined"
        );
    }
    attach_indicators(bars, &set);
}

/// Compute a deterministic BLAKE3 hash over timestamps and OHLCV values.
///
/// Indicator columns are derived data and do not contribute.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate `n` five-minute bars of a seeded random walk starting at 100.0.
///
/// Bars are OHLC-consistent and strictly increasing in time. The same seed
/// always produces the same series.
pub fn generate_synthetic_bars(n: usize, seed: u64) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    for i in 0..n {
        let ret: f64 = rng.gen_range(-0.002..0.002) + 0.00002;
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.001));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.001));
        let volume = f64::from(rng.gen_range(100..10_000u32));
        bars.push(Bar::new(
            start + Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume,
        ));
        price = close;
    }
    bars
}
