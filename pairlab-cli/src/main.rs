//! PairLab CLI: single runs, parameter sweeps, and report inspection.
//!
//! Commands:
//! - `run`: backtest one (rolling period, z threshold) configuration
//! - `sweep`: run the configured grid, rank by Sharpe, and export the selected cell
//! - `inspect`: print the ranked table of a saved sweep report

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pairlab_core::strategy::PairState;
use pairlab_runner::config::DataSourceKind;
use pairlab_runner::export::{
    fmt_ratio, format_table, load_report, save_run_artifacts, save_sweep_artifacts,
};
use pairlab_runner::{
    load_configured_pair, run_configured, BacktestResult, ParamSweep, PairConfig, Selection,
    SweepReport,
};

#[derive(Parser)]
#[command(
    name = "pairlab",
    about = "PairLab CLI: pairs-trading backtester and parameter sweep"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Data-source overrides shared by `run` and `sweep`.
#[derive(Args)]
struct DataArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "pairlab.toml")]
    config: PathBuf,

    /// Directory of <SYMBOL>.csv files; implies the csv source.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use deterministic synthetic bars instead of CSV files.
    #[arg(long, default_value_t = false, conflicts_with = "data_dir")]
    synthetic: bool,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Print results without writing artifacts.
    #[arg(long, default_value_t = false)]
    no_save: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single parameter set from the config file.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Override strategy.rolling_period.
        #[arg(long)]
        rolling_period: Option<usize>,

        /// Override strategy.zscore_threshold.
        #[arg(long)]
        zscore_threshold: Option<f64>,

        /// Override strategy.initial_state: flat, long_spread_short_y, short_spread_long_y.
        #[arg(long)]
        initial_state: Option<PairState>,
    },
    /// Sweep the configured grid and export the selected cell.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Rolling period of the cell to export. Defaults to the best row.
        #[arg(long, requires = "select_z")]
        select_rp: Option<usize>,

        /// Z threshold of the cell to export. Defaults to the best row.
        #[arg(long, requires = "select_rp")]
        select_z: Option<f64>,

        /// Override sweep.max_concurrency.
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
    /// Print the ranked table of a saved report (file or artifact directory).
    Inspect {
        path: PathBuf,

        /// Show only the top N rows.
        #[arg(long)]
        top: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            rolling_period,
            zscore_threshold,
            initial_state,
        } => {
            let mut config = load_config(&data)?;
            if let Some(rp) = rolling_period {
                config.strategy.rolling_period = rp;
            }
            if let Some(zs) = zscore_threshold {
                config.strategy.zscore_threshold = zs;
            }
            if let Some(state) = initial_state {
                config.strategy.initial_state = state;
            }
            run_cmd(&config, &data)
        }
        Commands::Sweep {
            data,
            select_rp,
            select_z,
            max_concurrency,
        } => {
            let mut config = load_config(&data)?;
            if max_concurrency.is_some() {
                config.sweep.max_concurrency = max_concurrency;
            }
            let selected = select_rp.zip(select_z);
            sweep_cmd(&config, &data, selected)
        }
        Commands::Inspect { path, top } => inspect_cmd(&path, top),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(data: &DataArgs) -> Result<PairConfig> {
    let mut config = PairConfig::from_file(&data.config)
        .with_context(|| format!("failed to load config {}", data.config.display()))?;
    if let Some(dir) = &data.data_dir {
        config.data.source = DataSourceKind::Csv;
        config.data.dir = dir.clone();
    }
    if data.synthetic {
        config.data.source = DataSourceKind::Synthetic;
    }
    Ok(config)
}

fn run_cmd(config: &PairConfig, data: &DataArgs) -> Result<()> {
    let result = run_configured(config)?;
    print_run_summary(&result);

    if !data.no_save {
        let run_dir = save_run_artifacts(&result, &data.output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn sweep_cmd(config: &PairConfig, data: &DataArgs, selected: Option<(usize, f64)>) -> Result<()> {
    config.validate()?;
    let loaded = load_configured_pair(config)?;

    let sweep = ParamSweep::new(config.engine_config(), config.analysis)
        .with_entry_weight(config.account.entry_weight)
        .with_max_concurrency(config.sweep.max_concurrency);
    let report = sweep.sweep(&loaded.pair, &loaded.dataset_hash, &config.sweep.grid())?;

    print_sweep_summary(&report);

    // A selection miss only fails the selection: the table is still saved.
    let selection = report.select_or_best(&loaded.pair, selected);
    let chosen = selection.as_ref().ok().and_then(Option::as_ref);
    if let Some(sel) = chosen {
        print_selection(sel);
    }
    if loaded.is_synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }

    if !data.no_save {
        let run_dir = save_sweep_artifacts(&report, chosen, &data.output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    selection?;
    Ok(())
}

fn inspect_cmd(path: &Path, top: Option<usize>) -> Result<()> {
    let report = load_report(path)?;
    let shown = top.unwrap_or(report.rows.len()).min(report.rows.len());
    if report.rows.is_empty() && report.failures.is_empty() {
        bail!("report at {} has no rows", path.display());
    }
    print_sweep_header(&report);
    print!("{}", format_table(&report.rows[..shown]));
    for f in &report.failures {
        println!(
            "FAILED rolling={} z={}: {}",
            f.rolling_period, f.zscore_threshold, f.error
        );
    }
    Ok(())
}

fn print_run_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Pair Backtest ===");
    println!("Pair:           {} / {}", result.x_symbol, result.y_symbol);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!(
        "Bars:           {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    println!(
        "Parameters:     rolling={} z={}",
        result.params.rolling_period, result.params.zscore_threshold
    );
    println!(
        "States:         {} -> {} ({} transitions)",
        result.initial_state,
        result.final_state,
        result.transitions.len()
    );
    println!("Fills:          {}", result.fills.len());
    println!();
    println!("--- Performance ---");
    println!("Starting Value: {:.2}", m.start_value);
    println!("Ending Value:   {:.2}", m.end_value);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annual Return:  {:.2}%", m.annualized_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Sharpe:         {}", fmt_ratio(m.sharpe_ratio));
    println!("Sortino:        {}", fmt_ratio(m.sortino_ratio));
    println!();
}

fn print_sweep_header(report: &SweepReport) {
    let g = &report.grid;
    println!();
    println!("=== Pair Sweep: {} / {} ===", report.x_symbol, report.y_symbol);
    println!(
        "Grid:           rolling {}..={} step {}, z {}..={} step {}",
        g.rp_min, g.rp_max, g.rp_step, g.zs_min, g.zs_max, g.zs_step
    );
    println!(
        "Cells:          {} ranked, {} failed",
        report.rows.len(),
        report.failures.len()
    );
    println!("Dataset:        {}", report.dataset_hash);
    println!();
}

fn print_sweep_summary(report: &SweepReport) {
    print_sweep_header(report);
    print!("{}", format_table(&report.rows));
    for f in &report.failures {
        println!(
            "FAILED rolling={} z={}: {}",
            f.rolling_period, f.zscore_threshold, f.error
        );
    }
}

fn print_selection(sel: &Selection) {
    println!();
    println!(
        "--- Selected: rolling={} z={} ---",
        sel.row.rolling_period, sel.row.zscore_threshold
    );
    if let (Some(first), Some(last)) = (sel.equity_curve.first(), sel.equity_curve.last()) {
        println!("Starting Value: {:.2}", first.total_value);
        println!("Ending Value:   {:.2}", last.total_value);
    }
    println!("Sharpe:         {}", fmt_ratio(sel.row.sharpe_ratio));
    println!("Sortino:        {}", fmt_ratio(sel.row.sortino_ratio));
    let last_corr = sel
        .correlation
        .iter()
        .rev()
        .find(|c| !c.correlation.is_nan());
    if let Some(c) = last_corr {
        println!("Correlation:    {:.3} on {}", c.correlation, c.date);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const SMALL_SYNTHETIC: &str = r#"
        [pair]
        x = "KO"
        y = "PEP"
        start_date = "2018-01-01"
        end_date = "2019-12-31"

        [sweep]
        rp_min = 20
        rp_max = 40
        rp_step = 20
        zs_min = 1.0
        zs_max = 2.0
        zs_step = 1.0

        [data]
        source = "synthetic"
    "#;

    fn data_args(root: &Path) -> DataArgs {
        let config = root.join("pairlab.toml");
        std::fs::write(&config, SMALL_SYNTHETIC).unwrap();
        DataArgs {
            config,
            data_dir: None,
            synthetic: false,
            output_dir: root.join("out"),
            no_save: false,
        }
    }

    fn saved_dirs(output_dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn off_grid_selection_fails_but_still_saves_the_table() {
        let tmp = tempfile::tempdir().unwrap();
        let data = data_args(tmp.path());
        let config = load_config(&data).unwrap();

        let err = sweep_cmd(&config, &data, Some((30, 1.0))).unwrap_err();
        assert!(err.to_string().contains("no cell"), "{err}");

        let dirs = saved_dirs(&data.output_dir);
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].join("table.csv").exists());
        assert!(dirs[0].join("report.json").exists());
        assert!(!dirs[0].join("selected_equity.csv").exists());

        let table = std::fs::read_to_string(dirs[0].join("table.csv")).unwrap();
        assert_eq!(table.lines().count(), 1 + 4);
    }

    #[test]
    fn default_selection_exports_the_best_cell() {
        let tmp = tempfile::tempdir().unwrap();
        let data = data_args(tmp.path());
        let config = load_config(&data).unwrap();

        sweep_cmd(&config, &data, None).unwrap();

        let dirs = saved_dirs(&data.output_dir);
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].join("table.csv").exists());
        assert!(dirs[0].join("selected_equity.csv").exists());
    }
}
