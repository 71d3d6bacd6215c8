//! Serializable run configuration, loaded from TOML.
//!
//! One file describes the data source, the instrument, the strategy with its
//! fixed parameters, and the walk-forward search (window lengths and the
//! parameter grid). Everything is validated up front so that a bad config
//! fails before any bars are loaded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use forwardlab_core::domain::{Instrument, InstrumentError};
use forwardlab_core::engine::EngineConfig;
use forwardlab_core::strategy::{ParamError, ParamSet, StrategyFactory, StrategyKind};

use crate::data_loader::{LoadOptions, DEFAULT_COLUMNS};
use crate::fitness::FitnessWeights;
use crate::grid::{GridError, ParamGrid};
use crate::walk_forward::WalkForwardConfig;

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("strategy params: {0}")]
    Params(#[from] ParamError),

    #[error("walk_forward.param_grid: {0}")]
    Grid(#[from] GridError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub walk_forward: WalkForwardSection,
    #[serde(default)]
    pub fitness: FitnessWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Relative paths resolve against the config file's directory.
    pub path: PathBuf,
    /// Single-character field delimiter; `"\t"` for tab-separated files.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_true")]
    pub has_headers: bool,
    /// Column names in file order, for files without a header row.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

/// Either a named preset, explicit contract fields, or a preset with overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub tick_size: Option<f64>,
    #[serde(default)]
    pub point_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Fixed parameter overrides; also the base of every walk-forward trial.
    #[serde(default)]
    pub params: ParamSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardSection {
    pub in_sample_len: usize,
    pub out_sample_len: usize,
    pub step_len: usize,
    pub parallel: bool,
    pub param_grid: ParamGrid,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_true() -> bool {
    true
}

fn default_capital() -> f64 {
    100_000.0
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
        }
    }
}

impl Default for WalkForwardSection {
    fn default() -> Self {
        let wf = WalkForwardConfig::default();
        Self {
            in_sample_len: wf.in_sample_len,
            out_sample_len: wf.out_sample_len,
            step_len: wf.step_len,
            parallel: wf.parallel,
            param_grid: ParamGrid::default(),
        }
    }
}

impl InstrumentConfig {
    pub fn resolve(&self) -> Result<Instrument, ConfigError> {
        let mut instrument = match &self.preset {
            Some(name) => Instrument::preset(name)?,
            None => {
                let (Some(tick_size), Some(point_value)) = (self.tick_size, self.point_value)
                else {
                    return Err(ConfigError::Invalid(
                        "[instrument] needs a preset or both tick_size and point_value".into(),
                    ));
                };
                Instrument {
                    symbol: self.symbol.clone().unwrap_or_default(),
                    tick_size,
                    point_value,
                }
            }
        };
        if let Some(symbol) = &self.symbol {
            instrument.symbol = symbol.clone();
        }
        if let Some(tick_size) = self.tick_size {
            instrument.tick_size = tick_size;
        }
        if let Some(point_value) = self.point_value {
            instrument.point_value = point_value;
        }
        instrument.validate()?;
        Ok(instrument)
    }
}

impl DataConfig {
    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        let delimiter = match self.delimiter.as_bytes() {
            [b] => *b,
            _ if self.delimiter == "\\t" || self.delimiter.eq_ignore_ascii_case("tab") => b'\t',
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "data.delimiter must be a single ASCII character, got {:?}",
                    self.delimiter
                )))
            }
        };
        if let Some(columns) = &self.columns {
            if columns.len() < DEFAULT_COLUMNS.len() - 1 {
                return Err(ConfigError::Invalid(format!(
                    "data.columns lists {} columns, need at least timestamp/open/high/low/close",
                    columns.len()
                )));
            }
        }
        Ok(LoadOptions {
            delimiter,
            has_headers: self.has_headers,
            columns: self.columns.clone(),
        })
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.data.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.data.path = dir.join(&config.data.path);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capital = self.backtest.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "backtest.initial_capital must be positive, got {capital}"
            )));
        }
        let instrument = self.instrument.resolve()?;
        self.data.load_options()?;

        // Fixed params must build on their own; grid values are checked per trial.
        self.strategy.kind.build(&self.strategy.params, &instrument)?;

        let wf = &self.walk_forward;
        if wf.in_sample_len == 0 || wf.out_sample_len == 0 || wf.step_len == 0 {
            return Err(ConfigError::Invalid(format!(
                "walk_forward lengths must be positive (in_sample_len={}, out_sample_len={}, step_len={})",
                wf.in_sample_len, wf.out_sample_len, wf.step_len
            )));
        }
        wf.param_grid.validate(&self.strategy.kind)?;

        if !self.fitness.is_finite() {
            return Err(ConfigError::Invalid("fitness weights must be finite".into()));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig::new(
            self.backtest.initial_capital,
            self.instrument.resolve()?,
        ))
    }

    pub fn walk_forward_config(&self) -> Result<WalkForwardConfig, ConfigError> {
        let wf = &self.walk_forward;
        Ok(WalkForwardConfig {
            in_sample_len: wf.in_sample_len,
            out_sample_len: wf.out_sample_len,
            step_len: wf.step_len,
            initial_capital: self.backtest.initial_capital,
            instrument: self.instrument.resolve()?,
            fitness: self.fitness,
            base_params: self.strategy.params.clone(),
            parallel: wf.parallel,
        })
    }

    /// Computes a deterministic hash ID for this configuration.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [data]
        path = "data/eurusd_5m.csv"
        delimiter = "\t"
        has_headers = false
        columns = ["timestamp", "close", "high", "low", "open", "volume"]

        [instrument]
        symbol = "EURUSD"
        tick_size = 0.00001
        point_value = 10.0

        [backtest]
        initial_capital = 50000.0

        [strategy]
        kind = "trend_crossover"
        [strategy.params]
        risk_per_trade = 0.02

        [walk_forward]
        in_sample_len = 2000
        out_sample_len = 500
        step_len = 500
        parallel = false

        [[walk_forward.param_grid]]
        name = "risk_per_trade"
        values = [0.01, 0.02]

        [[walk_forward.param_grid]]
        name = "atr_stop_multiplier"
        values = [2.0, 3.0]

        [fitness]
        pnl = 0.5
    "#;

    const MINIMAL: &str = r#"
        [data]
        path = "bars.csv"

        [instrument]
        preset = "NQ"

        [strategy]
        kind = "sma_cross"
    "#;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.strategy.kind, StrategyKind::TrendCrossover);
        assert_eq!(config.strategy.params.get("risk_per_trade"), Some(0.02));
        assert_eq!(config.walk_forward.param_grid.size(), 4);
        assert!(!config.walk_forward.parallel);
        assert_eq!(config.fitness.pnl, 0.5);
        assert_eq!(config.fitness.trade_count, 0.1);

        let opts = config.data.load_options().unwrap();
        assert_eq!(opts.delimiter, b'\t');
        assert!(!opts.has_headers);
        assert_eq!(opts.columns.unwrap()[1], "close");

        let instrument = config.instrument.resolve().unwrap();
        assert_eq!(instrument.point_value, 10.0);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = RunConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.backtest.initial_capital, 100_000.0);
        assert_eq!(config.walk_forward.in_sample_len, 10_000);
        assert_eq!(config.walk_forward.out_sample_len, 5_000);
        assert_eq!(config.walk_forward.step_len, 2_500);
        assert!(config.walk_forward.parallel);
        assert_eq!(config.walk_forward.param_grid.size(), 1);
        assert_eq!(config.fitness, FitnessWeights::default());
        assert_eq!(config.data.load_options().unwrap(), LoadOptions::default());
        assert_eq!(config.instrument.resolve().unwrap(), Instrument::nq());
    }

    #[test]
    fn walk_forward_config_carries_backtest_settings() {
        let config = RunConfig::from_toml_str(FULL).unwrap();
        let wf = config.walk_forward_config().unwrap();
        assert_eq!(wf.initial_capital, 50_000.0);
        assert_eq!(wf.in_sample_len, 2000);
        assert_eq!(wf.instrument.symbol, "EURUSD");
        assert_eq!(wf.fitness.pnl, 0.5);
        assert_eq!(wf.base_params.get("risk_per_trade"), Some(0.02));
    }

    #[test]
    fn preset_fields_can_be_overridden() {
        let cfg = InstrumentConfig {
            preset: Some("es".into()),
            point_value: Some(5.0),
            ..Default::default()
        };
        let instrument = cfg.resolve().unwrap();
        assert_eq!(instrument.symbol, "ES");
        assert_eq!(instrument.point_value, 5.0);
    }

    #[test]
    fn rejects_non_positive_capital() {
        let text = MINIMAL.replace("[strategy]", "[backtest]\ninitial_capital = 0.0\n[strategy]");
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_preset() {
        let text = MINIMAL.replace("\"NQ\"", "\"CL\"");
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Instrument(InstrumentError::UnknownPreset(_)))
        ));
    }

    #[test]
    fn rejects_non_positive_point_value() {
        let cfg = InstrumentConfig {
            tick_size: Some(0.25),
            point_value: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::Instrument(InstrumentError::InvalidPointValue(_)))
        ));
    }

    #[test]
    fn rejects_incomplete_instrument() {
        let cfg = InstrumentConfig {
            symbol: Some("XYZ".into()),
            tick_size: Some(0.01),
            ..Default::default()
        };
        assert!(matches!(cfg.resolve(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_strategy_param() {
        let text = MINIMAL.replace(
            "kind = \"sma_cross\"",
            "kind = \"sma_cross\"\n[strategy.params]\nrsi_oversold = 30.0",
        );
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Params(ParamError::UnknownParam { .. }))
        ));
    }

    #[test]
    fn rejects_grid_axis_for_other_strategy() {
        let text = format!(
            "{MINIMAL}\n[[walk_forward.param_grid]]\nname = \"use_trailing_stop\"\nvalues = [0.0, 1.0]\n"
        );
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Grid(GridError::UnknownParam { .. }))
        ));
    }

    #[test]
    fn rejects_multi_char_delimiter() {
        let text = MINIMAL.replace("path = \"bars.csv\"", "path = \"bars.csv\"\ndelimiter = \";;\"");
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_strategy_kind() {
        let text = MINIMAL.replace("sma_cross", "martingale");
        assert!(matches!(
            RunConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_resolves_relative_data_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.data.path, dir.path().join("bars.csv"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunConfig::load(&dir.path().join("nope.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn run_id_deterministic_and_sensitive() {
        let a = RunConfig::from_toml_str(FULL).unwrap();
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.backtest.initial_capital = 60_000.0;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }
}
