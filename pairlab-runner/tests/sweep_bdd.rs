//! BDD tests for the parameter sweep and selector.
//!
//! - Flat data: nine cells, no orders, zero return, indeterminate ratios
//! - Ranking: Sharpe descending with NaN last
//! - Selection: exact lookup, missing cells, failed cells
//! - Cancellation and failing cells

use chrono::NaiveDate;
use pairlab_core::data::{align_pair, bars_from_closes, load_pair, AlignedPair, SyntheticProvider};
use pairlab_core::engine::EngineConfig;
use pairlab_core::fingerprint::DatasetHash;
use pairlab_core::strategy::PairParams;
use pairlab_runner::export::save_sweep_artifacts;
use pairlab_runner::{
    run_pair_backtest, AnalysisConfig, CancelToken, MetricsRow, ParamSweep, SelectError,
    SweepError, SweepGrid,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn default_grid() -> SweepGrid {
    SweepGrid {
        rp_min: 50,
        rp_max: 150,
        rp_step: 50,
        zs_min: 1.0,
        zs_max: 3.0,
        zs_step: 1.0,
    }
}

fn flat_pair(bars: usize) -> AlignedPair {
    align_pair(
        "FLATX",
        bars_from_closes(d("2020-01-01"), &vec![100.0; bars]),
        "FLATY",
        bars_from_closes(d("2020-01-01"), &vec![40.0; bars]),
    )
    .unwrap()
}

fn synthetic_pair() -> AlignedPair {
    load_pair(
        &SyntheticProvider::new(),
        "KO",
        "PEP",
        d("2016-01-01"),
        d("2020-12-31"),
    )
    .unwrap()
}

fn sweep() -> ParamSweep {
    ParamSweep::new(EngineConfig::default(), AnalysisConfig::default())
}

fn same_bits(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

fn same_row(a: &MetricsRow, b: &MetricsRow) -> bool {
    a.rolling_period == b.rolling_period
        && same_bits(a.zscore_threshold, b.zscore_threshold)
        && same_bits(a.annualized_return, b.annualized_return)
        && same_bits(a.max_drawdown, b.max_drawdown)
        && same_bits(a.sharpe_ratio, b.sharpe_ratio)
        && same_bits(a.sortino_ratio, b.sortino_ratio)
        && same_bits(a.end_value, b.end_value)
        && a.trade_count == b.trade_count
}

#[test]
fn bdd_flat_prices_produce_nine_idle_rows() {
    // GIVEN two instruments whose prices never move
    let pair = flat_pair(400);
    let hash = DatasetHash::of(&pair);

    // WHEN we sweep rp in {50,100,150} x zs in {1,2,3}
    let report = sweep().sweep(&pair, &hash, &default_grid()).unwrap();

    // THEN there are nine rows and no failures
    assert_eq!(report.rows.len(), 9);
    assert!(report.failures.is_empty());

    // AND every row is idle with indeterminate ratios
    for row in &report.rows {
        assert_eq!(row.trade_count, 0);
        assert_eq!(row.annualized_return, 0.0);
        assert_eq!(row.max_drawdown, 0.0);
        assert!(row.sharpe_ratio.is_nan());
        assert!(row.sortino_ratio.is_nan());
        assert_eq!(row.end_value, 1_000_000.0);
    }

    // AND with every Sharpe tied at NaN, ranking preserves grid order
    let order: Vec<(usize, f64)> = report
        .rows
        .iter()
        .map(|r| (r.rolling_period, r.zscore_threshold))
        .collect();
    assert_eq!(order, default_grid().cells());
}

#[test]
fn bdd_ranked_table_is_sharpe_descending_nan_last() {
    // GIVEN co-moving synthetic instruments
    let pair = synthetic_pair();
    let hash = DatasetHash::of(&pair);
    let grid = SweepGrid {
        rp_min: 20,
        rp_max: 60,
        rp_step: 20,
        zs_min: 0.5,
        zs_max: 2.0,
        zs_step: 0.5,
    };

    // WHEN we run the sweep on two worker threads
    let report = sweep()
        .with_max_concurrency(Some(2))
        .sweep(&pair, &hash, &grid)
        .unwrap();

    // THEN all twelve cells are present
    assert_eq!(report.rows.len(), 12);
    assert_eq!(report.runs.len(), 12);

    // AND adjacent rows never increase in Sharpe, NaNs only at the end
    for w in report.rows.windows(2) {
        let (a, b) = (w[0].sharpe_ratio, w[1].sharpe_ratio);
        if a.is_nan() {
            assert!(b.is_nan());
        } else if !b.is_nan() {
            assert!(a >= b, "{a} before {b}");
        }
    }
    assert!(same_row(report.best().unwrap(), &report.rows[0]));
}

#[test]
fn bdd_selector_matches_direct_single_run() {
    // GIVEN a completed sweep
    let pair = synthetic_pair();
    let hash = DatasetHash::of(&pair);
    let grid = SweepGrid {
        rp_min: 30,
        rp_max: 90,
        rp_step: 30,
        zs_min: 1.0,
        zs_max: 2.0,
        zs_step: 0.5,
    };
    let report = sweep().sweep(&pair, &hash, &grid).unwrap();

    for (rp, zs) in grid.cells() {
        // WHEN we select a cell
        let selection = report.select(&pair, rp, zs).unwrap();

        // THEN its row and trajectory equal a direct run of that configuration
        let direct = run_pair_backtest(
            &pair,
            &hash,
            &PairParams::new(rp, zs).unwrap(),
            &EngineConfig::default(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert!(same_row(&selection.row, &MetricsRow::from_result(&direct)));
        assert_eq!(selection.equity_curve, direct.equity_curve);

        // AND the correlation series covers every bar, undefined before the window fills
        assert_eq!(selection.correlation.len(), pair.len());
        assert!(selection.correlation[..rp - 1]
            .iter()
            .all(|c| c.correlation.is_nan()));
    }
}

#[test]
fn bdd_selecting_outside_the_grid_is_parameter_not_found() {
    // GIVEN a sweep over the default grid
    let pair = flat_pair(400);
    let hash = DatasetHash::of(&pair);
    let report = sweep().sweep(&pair, &hash, &default_grid()).unwrap();

    // WHEN the caller asks for a period off the step, or a threshold between steps
    for (rp, zs) in [(75, 2.0), (100, 2.5), (200, 1.0)] {
        let err = report.select(&pair, rp, zs).unwrap_err();

        // THEN the lookup fails explicitly and the table is still usable
        assert_eq!(
            err,
            SelectError::ParameterNotFound {
                rolling_period: rp,
                zscore_threshold: zs
            }
        );
    }
    assert_eq!(report.rows.len(), 9);
}

#[test]
fn bdd_selection_miss_leaves_the_table_exportable() {
    // GIVEN a sweep over the default grid
    let pair = flat_pair(400);
    let hash = DatasetHash::of(&pair);
    let report = sweep().sweep(&pair, &hash, &default_grid()).unwrap();

    // WHEN an off-grid cell is requested
    let selection = report.select_or_best(&pair, Some((75, 2.0)));

    // THEN only the selection fails
    assert!(matches!(
        selection,
        Err(SelectError::ParameterNotFound { rolling_period: 75, .. })
    ));

    // AND the table still saves without selected-cell files
    let tmp = tempfile::tempdir().unwrap();
    let chosen = selection.as_ref().ok().and_then(Option::as_ref);
    let dir = save_sweep_artifacts(&report, chosen, tmp.path()).unwrap();
    let table = std::fs::read_to_string(dir.join("table.csv")).unwrap();
    assert_eq!(table.lines().count(), 1 + 9);
    assert!(dir.join("report.json").exists());
    assert!(!dir.join("selected_equity.csv").exists());
}

#[test]
fn bdd_no_request_selects_the_best_row() {
    // GIVEN a sweep over the default grid
    let pair = flat_pair(400);
    let hash = DatasetHash::of(&pair);
    let report = sweep().sweep(&pair, &hash, &default_grid()).unwrap();

    // WHEN no cell is requested
    let selection = report.select_or_best(&pair, None).unwrap().unwrap();

    // THEN the top-ranked row is selected
    let best = report.best().unwrap();
    assert_eq!(selection.row.rolling_period, best.rolling_period);
    assert_eq!(selection.row.zscore_threshold, best.zscore_threshold);
}

#[test]
fn bdd_failing_cells_are_reported_not_ranked() {
    // GIVEN an entry weight outside [0, 1], so every cell's run fails
    let pair = flat_pair(200);
    let hash = DatasetHash::of(&pair);
    let bad = sweep().with_entry_weight(1.5);

    // WHEN we sweep
    let report = bad.sweep(&pair, &hash, &default_grid()).unwrap();

    // THEN no rows are ranked and every cell is listed as failed
    assert!(report.rows.is_empty());
    assert_eq!(report.failures.len(), 9);

    // AND selecting one of them surfaces the failure
    assert!(matches!(
        report.select(&pair, 50, 1.0),
        Err(SelectError::CellFailed { .. })
    ));
}

#[test]
fn bdd_cancelled_sweep_returns_cancelled() {
    // GIVEN a sweep whose token is already cancelled
    let token = CancelToken::new();
    token.cancel();
    let pair = flat_pair(200);
    let hash = DatasetHash::of(&pair);

    // WHEN it runs
    let result = sweep()
        .with_cancel_token(token)
        .sweep(&pair, &hash, &default_grid());

    // THEN no cell starts and the caller sees Cancelled
    match result {
        Err(SweepError::Cancelled { completed, total }) => {
            assert_eq!(completed, 0);
            assert_eq!(total, 9);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[test]
fn bdd_invalid_grid_is_rejected_before_running() {
    let pair = flat_pair(50);
    let hash = DatasetHash::of(&pair);
    let grid = SweepGrid {
        rp_step: 0,
        ..default_grid()
    };
    assert!(matches!(
        sweep().sweep(&pair, &hash, &grid),
        Err(SweepError::InvalidGrid(_))
    ));
}

#[test]
fn sweeping_twice_is_bit_identical() {
    let pair = synthetic_pair();
    let hash = DatasetHash::of(&pair);
    let grid = SweepGrid {
        rp_min: 20,
        rp_max: 40,
        rp_step: 20,
        zs_min: 1.0,
        zs_max: 2.0,
        zs_step: 1.0,
    };
    let a = sweep().sweep(&pair, &hash, &grid).unwrap();
    let b = sweep()
        .with_max_concurrency(Some(1))
        .sweep(&pair, &hash, &grid)
        .unwrap();
    assert_eq!(a.rows.len(), b.rows.len());
    for (x, y) in a.rows.iter().zip(&b.rows) {
        assert!(same_row(x, y));
    }
    for (x, y) in a.runs.iter().zip(&b.runs) {
        assert_eq!(x.equity_curve, y.equity_curve);
    }
}
