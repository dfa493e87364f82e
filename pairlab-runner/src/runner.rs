//! Backtest runner: wires together data, engine, and metrics.
//!
//! Two entry points:
//! - `run_configured()`: loads the pair named in a `PairConfig`, then runs. Used by CLI.
//! - `run_pair_backtest()`: takes a pre-loaded pair. Used by the sweep, with no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pairlab_core::data::AlignedPair;
use pairlab_core::domain::{Fill, ValuationPoint};
use pairlab_core::engine::{run_pair, EngineConfig, SimulationError};
use pairlab_core::fingerprint::{DatasetHash, RunFingerprint};
use pairlab_core::strategy::{PairParams, PairState, StateTransition};

use crate::config::{AnalysisConfig, ConfigError, PairConfig};
use crate::data_loader::{load_configured_pair, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Hash of (dataset, parameters, account); equal for identical inputs.
    pub run_id: String,
    pub x_symbol: String,
    pub y_symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub params: PairParams,
    pub initial_capital: f64,
    pub initial_state: PairState,
    pub final_state: PairState,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<ValuationPoint>,
    pub fills: Vec<Fill>,
    pub transitions: Vec<StateTransition>,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub warmup_bars: usize,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.total_value).collect()
    }
}

/// Run one backtest with pre-loaded data: no I/O.
pub fn run_pair_backtest(
    pair: &AlignedPair,
    dataset_hash: &DatasetHash,
    params: &PairParams,
    engine: &EngineConfig,
    analysis: &AnalysisConfig,
) -> Result<BacktestResult, RunError> {
    let result = run_pair(pair, params, engine)?;
    let values = result.values();
    let metrics = PerformanceMetrics::compute(&values, analysis);
    let run_id = RunFingerprint::new(dataset_hash.clone(), *params, *engine).hash();

    let (start_date, end_date) = match (pair.first_date(), pair.last_date()) {
        (Some(first), Some(last)) => (first, last),
        _ => (NaiveDate::MIN, NaiveDate::MIN),
    };

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        x_symbol: pair.x_symbol.clone(),
        y_symbol: pair.y_symbol.clone(),
        start_date,
        end_date,
        params: *params,
        initial_capital: engine.initial_capital,
        initial_state: engine.initial_state,
        final_state: result.final_state,
        metrics,
        bar_count: result.bar_count(),
        warmup_bars: result.warmup_bars,
        equity_curve: result.equity_curve,
        fills: result.fills,
        transitions: result.transitions,
        dataset_hash: dataset_hash.to_string(),
    })
}

/// Load the configured pair and run the configured single parameter set.
pub fn run_configured(config: &PairConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_configured_pair(config)?;
    let result = run_pair_backtest(
        &loaded.pair,
        &loaded.dataset_hash,
        &config.params(),
        &config.engine_config(),
        &config.analysis,
    )?;

    tracing::info!(
        x = %result.x_symbol,
        y = %result.y_symbol,
        rolling_period = result.params.rolling_period,
        zscore_threshold = result.params.zscore_threshold,
        start_value = result.metrics.start_value,
        end_value = result.metrics.end_value,
        sharpe = result.metrics.sharpe_ratio,
        transitions = result.transitions.len(),
        "backtest complete"
    );
    Ok(result)
}
