//! ForwardLab CLI — backtest, walk-forward and diagnose commands.
//!
//! Commands:
//! - `backtest` — run the configured strategy once over the whole series
//! - `walk-forward` — rolling in-sample grid search with out-of-sample evaluation
//! - `diagnose` — data sanity checks plus a backtest audit
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use forwardlab_core::engine::{run_backtest, EngineConfig, RunResult};
use forwardlab_core::strategy::StrategyFactory;
use forwardlab_runner::export::{format_stats, format_walk_forward, save_backtest, save_walk_forward};
use forwardlab_runner::{
    diagnose, load_csv, load_synthetic, run_walk_forward, LoadedData, RunConfig, TradeStats,
};

#[derive(Parser)]
#[command(
    name = "forwardlab",
    about = "ForwardLab CLI — bar-sequential backtesting and walk-forward optimization"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured strategy once over the whole series.
    Backtest {
        #[command(flatten)]
        input: InputArgs,

        /// Directory for trades.csv, equity.csv and summary.json.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Rolling in-sample grid search with out-of-sample evaluation.
    WalkForward {
        #[command(flatten)]
        input: InputArgs,

        /// Directory for the walk-forward report and OOS trades.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Evaluate grid combinations one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Check the data and audit a backtest of the configured strategy.
    Diagnose {
        #[command(flatten)]
        input: InputArgs,

        /// Print the report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to a TOML run config.
    #[arg(long)]
    config: PathBuf,

    /// Use N synthetic bars instead of the configured data file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic bars.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest { input, output_dir } => run_backtest_cmd(&input, &output_dir),
        Commands::WalkForward {
            input,
            output_dir,
            sequential,
        } => run_walk_forward_cmd(&input, &output_dir, sequential),
        Commands::Diagnose { input, json } => run_diagnose_cmd(&input, json),
    }
}

fn load_inputs(input: &InputArgs) -> Result<(RunConfig, LoadedData)> {
    let config = RunConfig::load(&input.config)
        .with_context(|| format!("failed to load config {}", input.config.display()))?;
    let run_id = config.run_id()?;
    info!(run_id = %&run_id[..12], strategy = %config.strategy.kind.as_str(), "config loaded");

    let data = match input.synthetic {
        Some(n) => load_synthetic(n, input.seed),
        None => load_csv(&config.data.path, &config.data.load_options()?)?,
    };
    info!(
        bars = data.bars.len(),
        dataset_hash = %&data.dataset_hash[..12],
        synthetic = data.is_synthetic,
        "data ready"
    );
    Ok((config, data))
}

fn backtest_configured(config: &RunConfig, data: &LoadedData) -> Result<(EngineConfig, RunResult)> {
    let engine_config = config.engine_config()?;
    let strategy = config
        .strategy
        .kind
        .build(&config.strategy.params, &engine_config.instrument)
        .context("invalid strategy parameters")?;
    let result = run_backtest(&data.bars, strategy.as_ref(), &engine_config)?;
    Ok((engine_config, result))
}

fn run_backtest_cmd(input: &InputArgs, output_dir: &Path) -> Result<()> {
    let (config, data) = load_inputs(input)?;
    let (_, result) = backtest_configured(&config, &data)?;
    let stats = TradeStats::compute(&result.trades, result.initial_capital, &result.equity_curve);

    println!();
    println!("=== Backtest: {} ===", config.strategy.kind.as_str());
    println!("Bars:            {}", result.bar_count);
    println!("Final equity:    {:.2}", result.final_equity);
    print!("{}", format_stats(&stats));

    let written = save_backtest(&result, &stats, output_dir)?;
    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_walk_forward_cmd(
    input: &InputArgs,
    output_dir: &Path,
    sequential: bool,
) -> Result<()> {
    let (config, data) = load_inputs(input)?;
    let mut wf_config = config.walk_forward_config()?;
    if sequential {
        wf_config.parallel = false;
    }

    let report = run_walk_forward(
        &data.bars,
        &config.strategy.kind,
        &config.walk_forward.param_grid,
        &wf_config,
        None,
    )?;

    println!();
    println!(
        "=== Walk-forward: {} ({} combinations) ===",
        report.strategy,
        config.walk_forward.param_grid.size()
    );
    print!("{}", format_walk_forward(&report));

    let written = save_walk_forward(&report, output_dir)?;
    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_diagnose_cmd(input: &InputArgs, json: bool) -> Result<()> {
    let (config, data) = load_inputs(input)?;
    let (engine_config, result) = backtest_configured(&config, &data)?;
    let report = diagnose(&data.bars, &result, &engine_config.instrument);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let d = &report.data;
    println!();
    println!("=== Diagnostics ===");
    println!("Bars:            {}", d.bar_count);
    println!("Dropped rows:    {}", data.dropped_rows);
    println!("Price range:     {:.5} .. {:.5}", d.min_low, d.max_high);
    println!("Large moves:     {}", d.large_moves);
    match d.mean_atr {
        Some(atr) => println!("Mean ATR(14):    {atr:.5}"),
        None => println!("Mean ATR(14):    n/a"),
    }
    println!("Trades audited:  {}", result.trades.len());
    println!();
    if report.findings.is_empty() {
        println!("No findings.");
    }
    for finding in &report.findings {
        println!("{finding}");
    }
    println!();
    println!("{} warning(s)", report.warnings().count());
    Ok(())
}
