//! ForwardLab Runner — walk-forward optimization, metrics, data and export.
//!
//! This crate builds on `forwardlab-core` to provide:
//! - Trade statistics and the weighted fitness score
//! - Parameter grids and the rolling walk-forward optimizer
//! - TOML run configuration
//! - CSV bar loading with indicator precompute, plus synthetic data
//! - CSV/JSON export and console summaries
//! - Data and trade diagnostics

pub mod config;
pub mod data_loader;
pub mod diagnostics;
pub mod export;
pub mod fitness;
pub mod grid;
pub mod metrics;
pub mod walk_forward;

pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{
    generate_synthetic_bars, load_csv, load_synthetic, LoadError, LoadOptions, LoadedData,
};
pub use diagnostics::{diagnose, DiagnosticsReport, Finding, Severity};
pub use fitness::FitnessWeights;
pub use grid::{GridError, ParamAxis, ParamGrid};
pub use metrics::TradeStats;
pub use walk_forward::{
    create_windows, run_walk_forward, WalkForwardConfig, WalkForwardError, WalkForwardReport,
    WalkForwardSummary, WindowResult, WindowSpec,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn trade_stats_is_send_sync() {
        assert_send::<TradeStats>();
        assert_sync::<TradeStats>();
    }

    #[test]
    fn walk_forward_types_are_send_sync() {
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
        assert_send::<WalkForwardReport>();
        assert_sync::<WalkForwardReport>();
        assert_send::<WindowResult>();
        assert_sync::<WindowResult>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<WalkForwardError>();
        assert_sync::<WalkForwardError>();
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }

    #[test]
    fn config_and_data_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
        assert_send::<DiagnosticsReport>();
        assert_sync::<DiagnosticsReport>();
    }
}
