//! PairLab Runner: configuration, analyzers, parameter sweep and export.
//!
//! This crate builds on `pairlab-core` to provide:
//! - TOML configuration with defaults and validation
//! - Pair loading from CSV or synthetic sources, with dataset fingerprinting
//! - Single-run orchestration and the analyzer set
//! - Parallel parameter sweep, Sharpe ranking and cell selection
//! - JSON / CSV / Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub(crate) mod serde_nan;
pub mod sweep;

pub use config::{AnalysisConfig, ConfigError, PairConfig};
pub use data_loader::{load_configured_pair, LoadError, LoadedPair};
pub use metrics::{Indeterminate, PerformanceMetrics, RunningStats};
pub use runner::{run_configured, run_pair_backtest, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{
    CancelToken, CellFailure, MetricsRow, ParamSweep, SelectError, Selection, SweepError,
    SweepGrid, SweepReport, MAX_GRID_CELLS,
};
