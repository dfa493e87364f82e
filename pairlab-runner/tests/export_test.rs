//! Artifact round-trips: JSON reports, CSV tables, artifact directories.

use chrono::NaiveDate;
use pairlab_core::data::{load_pair, SyntheticProvider};
use pairlab_core::engine::EngineConfig;
use pairlab_core::fingerprint::DatasetHash;
use pairlab_core::strategy::PairParams;
use pairlab_runner::export::{
    export_report_json, export_result_json, export_table_csv, fmt_ratio, format_table,
    import_report_json, import_result_json, load_report, save_run_artifacts,
    save_sweep_artifacts,
};
use pairlab_runner::{run_pair_backtest, AnalysisConfig, ParamSweep, SweepGrid, SweepReport};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn small_report() -> (pairlab_core::AlignedPair, SweepReport) {
    let pair = load_pair(
        &SyntheticProvider::new(),
        "GLD",
        "GDX",
        d("2019-01-01"),
        d("2020-12-31"),
    )
    .unwrap();
    let hash = DatasetHash::of(&pair);
    let grid = SweepGrid {
        rp_min: 20,
        rp_max: 40,
        rp_step: 20,
        zs_min: 1.0,
        zs_max: 2.0,
        zs_step: 1.0,
    };
    let report = ParamSweep::new(EngineConfig::default(), AnalysisConfig::default())
        .sweep(&pair, &hash, &grid)
        .unwrap();
    (pair, report)
}

#[test]
fn report_json_round_trips_including_nan_ratios() {
    let (_, mut report) = small_report();
    report.rows[0].sharpe_ratio = f64::NAN;

    let json = export_report_json(&report).unwrap();
    assert!(json.contains("\"sharpe_ratio\": null"));

    let back = import_report_json(&json).unwrap();
    assert!(back.rows[0].sharpe_ratio.is_nan());
    assert_eq!(back.rows.len(), report.rows.len());
    assert_eq!(back.runs[0].equity_curve, report.runs[0].equity_curve);
    assert_eq!(back.dataset_hash, report.dataset_hash);
}

#[test]
fn newer_schema_versions_are_rejected() {
    let (_, mut report) = small_report();
    report.schema_version = 99;
    let json = export_report_json(&report).unwrap();
    let err = import_report_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version 99"));
}

#[test]
fn single_run_result_round_trips() {
    let (pair, _) = small_report();
    let result = run_pair_backtest(
        &pair,
        &DatasetHash::of(&pair),
        &PairParams::new(30, 1.5).unwrap(),
        &EngineConfig::default(),
        &AnalysisConfig::default(),
    )
    .unwrap();

    let back = import_result_json(&export_result_json(&result).unwrap()).unwrap();
    assert_eq!(back.run_id, result.run_id);
    assert_eq!(back.fills, result.fills);
    assert_eq!(back.transitions, result.transitions);
    assert_eq!(back.final_state, result.final_state);
}

#[test]
fn table_csv_has_header_and_one_line_per_row() {
    let (_, report) = small_report();
    let csv = export_table_csv(&report.rows).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "rank,rolling_period,zscore_threshold,annualized_return,max_drawdown,sharpe_ratio,sortino_ratio,end_value,trade_count"
    );
    assert_eq!(lines.count(), report.rows.len());
}

#[test]
fn sweep_artifacts_are_written_and_reloadable() {
    let (pair, report) = small_report();
    let selection = report.select(&pair, 20, 1.0).unwrap();
    let tmp = tempfile::tempdir().unwrap();

    let dir = save_sweep_artifacts(&report, Some(&selection), tmp.path()).unwrap();
    for name in [
        "report.json",
        "table.csv",
        "report.md",
        "selected_equity.csv",
        "selected_correlation.csv",
    ] {
        assert!(dir.join(name).exists(), "missing {name}");
    }

    let reloaded = load_report(&dir).unwrap();
    assert_eq!(reloaded.rows.len(), report.rows.len());
    assert!(format_table(&reloaded.rows).contains("Sharpe"));
}

#[test]
fn run_artifacts_are_written() {
    let (pair, _) = small_report();
    let result = run_pair_backtest(
        &pair,
        &DatasetHash::of(&pair),
        &PairParams::new(20, 1.0).unwrap(),
        &EngineConfig::default(),
        &AnalysisConfig::default(),
    )
    .unwrap();
    let tmp = tempfile::tempdir().unwrap();

    let dir = save_run_artifacts(&result, tmp.path()).unwrap();
    for name in ["manifest.json", "equity.csv", "fills.csv", "transitions.csv"] {
        assert!(dir.join(name).exists(), "missing {name}");
    }
    let equity = std::fs::read_to_string(dir.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), result.equity_curve.len() + 1);
}

#[test]
fn ratios_print_three_decimals_or_na() {
    assert_eq!(fmt_ratio(1.23456), "1.235");
    assert_eq!(fmt_ratio(-0.5), "-0.500");
    assert_eq!(fmt_ratio(f64::NAN), "n/a");

    let (_, mut report) = small_report();
    report.rows[0].sortino_ratio = f64::NAN;
    assert!(format_table(&report.rows).contains("n/a"));
}
