//! Parameter sweep over (rolling_period, zscore_threshold) and selection.
//!
//! Every grid cell is an independent run over the same read-only pair. Cells
//! execute on a rayon pool sized by the concurrency limit; results are
//! collected in grid order once every cell has finished, then ranked by
//! Sharpe ratio.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pairlab_core::data::AlignedPair;
use pairlab_core::domain::ValuationPoint;
use pairlab_core::engine::EngineConfig;
use pairlab_core::fingerprint::DatasetHash;
use pairlab_core::strategy::PairParams;

use crate::config::AnalysisConfig;
use crate::metrics::rolling_correlation;
use crate::runner::{run_pair_backtest, BacktestResult, SCHEMA_VERSION};

/// Thresholds closer than this are the same grid point.
pub const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Largest grid a sweep accepts.
pub const MAX_GRID_CELLS: usize = 100_000;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep grid: {0}")]
    InvalidGrid(String),

    #[error("failed to build sweep thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("sweep cancelled after {completed} of {total} cells")]
    Cancelled { completed: usize, total: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    #[error("no cell for rolling_period={rolling_period}, zscore_threshold={zscore_threshold} in the swept grid")]
    ParameterNotFound {
        rolling_period: usize,
        zscore_threshold: f64,
    },

    #[error("cell rolling_period={rolling_period}, zscore_threshold={zscore_threshold} failed: {error}")]
    CellFailed {
        rolling_period: usize,
        zscore_threshold: f64,
        error: String,
    },
}

// ─── Grid ───────────────────────────────────────────────────────────

/// Inclusive bounds of the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub rp_min: usize,
    pub rp_max: usize,
    pub rp_step: usize,
    pub zs_min: f64,
    pub zs_max: f64,
    pub zs_step: f64,
}

impl SweepGrid {
    pub fn validate(&self) -> Result<(), SweepError> {
        let invalid = |msg: String| Err(SweepError::InvalidGrid(msg));
        if self.rp_step == 0 {
            return invalid("rp_step must be positive".into());
        }
        if self.rp_min < 2 {
            return invalid(format!("rp_min must be at least 2, got {}", self.rp_min));
        }
        if self.rp_min > self.rp_max {
            return invalid(format!("rp_min {} > rp_max {}", self.rp_min, self.rp_max));
        }
        if ![self.zs_min, self.zs_max, self.zs_step].iter().all(|v| v.is_finite()) {
            return invalid("threshold bounds must be finite".into());
        }
        if self.zs_step <= 0.0 {
            return invalid("zs_step must be positive".into());
        }
        if self.zs_min < 0.0 || self.zs_min > self.zs_max {
            return invalid(format!(
                "threshold range {}..={} is empty or negative",
                self.zs_min, self.zs_max
            ));
        }
        // Counted without materializing the axes.
        let rp_count = ((self.rp_max - self.rp_min) / self.rp_step + 1) as f64;
        let zs_count =
            ((self.zs_max - self.zs_min) / self.zs_step + THRESHOLD_TOLERANCE).floor() + 1.0;
        let cells = rp_count * zs_count;
        if cells > MAX_GRID_CELLS as f64 {
            return invalid(format!(
                "grid has {cells:.0} cells, more than the limit of {MAX_GRID_CELLS}"
            ));
        }
        Ok(())
    }

    pub fn rolling_periods(&self) -> Vec<usize> {
        if self.rp_step == 0 {
            return Vec::new();
        }
        (self.rp_min..=self.rp_max).step_by(self.rp_step).collect()
    }

    /// `zs_min + i * zs_step` up to `zs_max`, tolerant of float drift.
    pub fn thresholds(&self) -> Vec<f64> {
        if !(self.zs_step > 0.0) || self.zs_min > self.zs_max {
            return Vec::new();
        }
        let span = (self.zs_max - self.zs_min) / self.zs_step;
        let count = (span + THRESHOLD_TOLERANCE).floor() as usize + 1;
        (0..count)
            .map(|i| self.zs_min + i as f64 * self.zs_step)
            .collect()
    }

    /// All cells, rolling period outer, threshold inner.
    pub fn cells(&self) -> Vec<(usize, f64)> {
        let thresholds = self.thresholds();
        self.rolling_periods()
            .into_iter()
            .flat_map(|rp| thresholds.iter().map(move |&zs| (rp, zs)))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.rolling_periods().len() * self.thresholds().len()
    }
}

// ─── Cancellation ───────────────────────────────────────────────────

/// Cooperative cancellation flag, checked before each cell starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// One row of the ranked table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub rolling_period: usize,
    pub zscore_threshold: f64,
    #[serde(with = "crate::serde_nan")]
    pub annualized_return: f64,
    pub max_drawdown: f64,
    #[serde(with = "crate::serde_nan")]
    pub sharpe_ratio: f64,
    #[serde(with = "crate::serde_nan")]
    pub sortino_ratio: f64,
    #[serde(with = "crate::serde_nan")]
    pub end_value: f64,
    pub trade_count: usize,
}

impl MetricsRow {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            rolling_period: result.params.rolling_period,
            zscore_threshold: result.params.zscore_threshold,
            annualized_return: result.metrics.annualized_return,
            max_drawdown: result.metrics.max_drawdown,
            sharpe_ratio: result.metrics.sharpe_ratio,
            sortino_ratio: result.metrics.sortino_ratio,
            end_value: result.metrics.end_value,
            trade_count: result.fills.len(),
        }
    }

    pub fn matches(&self, rolling_period: usize, zscore_threshold: f64) -> bool {
        self.rolling_period == rolling_period
            && (self.zscore_threshold - zscore_threshold).abs() <= THRESHOLD_TOLERANCE
    }
}

/// A cell whose run returned an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub rolling_period: usize,
    pub zscore_threshold: f64,
    pub error: String,
}

/// Completed cell: its row and trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRun {
    pub row: MetricsRow,
    pub equity_curve: Vec<ValuationPoint>,
}

enum CellOutcome {
    Done(Box<CellRun>),
    Failed(CellFailure),
    Skipped,
}

/// Rolling correlation of the two closes on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPoint {
    pub date: chrono::NaiveDate,
    #[serde(with = "crate::serde_nan")]
    pub correlation: f64,
}

/// The selected cell, ready for the reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub row: MetricsRow,
    pub equity_curve: Vec<ValuationPoint>,
    pub correlation: Vec<CorrelationPoint>,
}

/// Output of a sweep: ranked rows, failed cells, and every cell's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub x_symbol: String,
    pub y_symbol: String,
    pub dataset_hash: String,
    pub grid: SweepGrid,
    /// Sorted by Sharpe descending, NaN last, ties in grid order.
    pub rows: Vec<MetricsRow>,
    pub failures: Vec<CellFailure>,
    /// Completed cells in grid order.
    pub runs: Vec<CellRun>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl SweepReport {
    pub fn best(&self) -> Option<&MetricsRow> {
        self.rows.first()
    }

    /// Select the requested cell, or the best-ranked row when none is
    /// requested. `Ok(None)` means nothing was requested and no cell ranked.
    pub fn select_or_best(
        &self,
        pair: &AlignedPair,
        requested: Option<(usize, f64)>,
    ) -> Result<Option<Selection>, SelectError> {
        let target =
            requested.or_else(|| self.best().map(|row| (row.rolling_period, row.zscore_threshold)));
        target
            .map(|(rp, zs)| self.select(pair, rp, zs))
            .transpose()
    }

    /// Locate one cell and pair its trajectory with the rolling correlation
    /// of the two closes over the cell's rolling period.
    pub fn select(
        &self,
        pair: &AlignedPair,
        rolling_period: usize,
        zscore_threshold: f64,
    ) -> Result<Selection, SelectError> {
        if let Some(run) = self
            .runs
            .iter()
            .find(|r| r.row.matches(rolling_period, zscore_threshold))
        {
            let corr = rolling_correlation(&pair.x_closes(), &pair.y_closes(), rolling_period);
            let correlation = pair
                .dates
                .iter()
                .zip(corr)
                .map(|(&date, correlation)| CorrelationPoint { date, correlation })
                .collect();
            return Ok(Selection {
                row: run.row.clone(),
                equity_curve: run.equity_curve.clone(),
                correlation,
            });
        }

        if let Some(failure) = self.failures.iter().find(|f| {
            f.rolling_period == rolling_period
                && (f.zscore_threshold - zscore_threshold).abs() <= THRESHOLD_TOLERANCE
        }) {
            return Err(SelectError::CellFailed {
                rolling_period,
                zscore_threshold,
                error: failure.error.clone(),
            });
        }

        Err(SelectError::ParameterNotFound {
            rolling_period,
            zscore_threshold,
        })
    }
}

/// Descending by Sharpe with NaN treated as worst.
pub fn compare_sharpe_desc(a: &MetricsRow, b: &MetricsRow) -> Ordering {
    match (a.sharpe_ratio.is_nan(), b.sharpe_ratio.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .sharpe_ratio
            .partial_cmp(&a.sharpe_ratio)
            .unwrap_or(Ordering::Equal),
    }
}

/// Stable sort by Sharpe descending, NaN last.
pub fn rank_rows(rows: &mut [MetricsRow]) {
    rows.sort_by(compare_sharpe_desc);
}

// ─── Executor ───────────────────────────────────────────────────────

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    engine: EngineConfig,
    entry_weight: f64,
    analysis: AnalysisConfig,
    max_concurrency: Option<usize>,
    cancel: CancelToken,
}

impl ParamSweep {
    pub fn new(engine: EngineConfig, analysis: AnalysisConfig) -> Self {
        Self {
            engine,
            entry_weight: 1.0,
            analysis,
            max_concurrency: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_entry_weight(mut self, entry_weight: f64) -> Self {
        self.entry_weight = entry_weight;
        self
    }

    /// Bound the number of worker threads (`None` = all cores).
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every cell of the grid over `pair`.
    ///
    /// A failing cell is recorded in `failures` and does not stop its
    /// siblings. Cancellation skips cells that have not started yet; cells
    /// already running finish, and the sweep then returns `Cancelled`.
    pub fn sweep(
        &self,
        pair: &AlignedPair,
        dataset_hash: &DatasetHash,
        grid: &SweepGrid,
    ) -> Result<SweepReport, SweepError> {
        grid.validate()?;
        let cells = grid.cells();
        let total = cells.len();

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(limit) = self.max_concurrency {
            builder = builder.num_threads(limit.max(1));
        }
        let pool = builder.build()?;

        tracing::info!(
            x = %pair.x_symbol,
            y = %pair.y_symbol,
            cells = total,
            threads = pool.current_num_threads(),
            "starting sweep"
        );

        let outcomes: Vec<CellOutcome> = pool.install(|| {
            cells
                .par_iter()
                .map(|&(rp, zs)| self.run_cell(pair, dataset_hash, rp, zs))
                .collect()
        });

        let mut runs = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut skipped = 0;
        for outcome in outcomes {
            match outcome {
                CellOutcome::Done(run) => runs.push(*run),
                CellOutcome::Failed(failure) => failures.push(failure),
                CellOutcome::Skipped => skipped += 1,
            }
        }

        if skipped > 0 || self.cancel.is_cancelled() {
            return Err(SweepError::Cancelled {
                completed: runs.len() + failures.len(),
                total,
            });
        }

        let mut rows: Vec<MetricsRow> = runs.iter().map(|r| r.row.clone()).collect();
        rank_rows(&mut rows);

        if let Some(best) = rows.first() {
            tracing::info!(
                completed = runs.len(),
                failed = failures.len(),
                best_rolling_period = best.rolling_period,
                best_zscore_threshold = best.zscore_threshold,
                best_sharpe = best.sharpe_ratio,
                "sweep complete"
            );
        } else {
            tracing::info!(failed = failures.len(), "sweep complete with no successful cells");
        }

        Ok(SweepReport {
            schema_version: SCHEMA_VERSION,
            x_symbol: pair.x_symbol.clone(),
            y_symbol: pair.y_symbol.clone(),
            dataset_hash: dataset_hash.to_string(),
            grid: grid.clone(),
            rows,
            failures,
            runs,
        })
    }

    fn run_cell(
        &self,
        pair: &AlignedPair,
        dataset_hash: &DatasetHash,
        rolling_period: usize,
        zscore_threshold: f64,
    ) -> CellOutcome {
        if self.cancel.is_cancelled() {
            return CellOutcome::Skipped;
        }
        let params = PairParams {
            rolling_period,
            zscore_threshold,
            entry_weight: self.entry_weight,
        };
        match run_pair_backtest(pair, dataset_hash, &params, &self.engine, &self.analysis) {
            Ok(result) => CellOutcome::Done(Box::new(CellRun {
                row: MetricsRow::from_result(&result),
                equity_curve: result.equity_curve,
            })),
            Err(e) => {
                tracing::warn!(rolling_period, zscore_threshold, error = %e, "sweep cell failed");
                CellOutcome::Failed(CellFailure {
                    rolling_period,
                    zscore_threshold,
                    error: e.to_string(),
                })
            }
        }
    }
}
