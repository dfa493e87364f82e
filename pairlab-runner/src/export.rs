//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: ranked table, equity trajectory, rolling correlation, fills
//! - **Markdown**: human-readable sweep and single-run reports
//!
//! All persisted artifacts carry a `schema_version`. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pairlab_core::domain::{Fill, ValuationPoint};
use pairlab_core::strategy::StateTransition;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::{CorrelationPoint, MetricsRow, Selection, SweepReport};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a sweep report to pretty JSON.
pub fn export_report_json(report: &SweepReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SweepReport to JSON")
}

/// Deserialize a sweep report, rejecting unknown schema versions.
pub fn import_report_json(json: &str) -> Result<SweepReport> {
    let report: SweepReport =
        serde_json::from_str(json).context("failed to deserialize SweepReport from JSON")?;
    check_schema(report.schema_version)?;
    Ok(report)
}

/// Serialize a single-run result to pretty JSON.
pub fn export_result_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a single-run result, rejecting unknown schema versions.
pub fn import_result_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    check_schema(result.schema_version)?;
    Ok(result)
}

fn check_schema(version: u32) -> Result<()> {
    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Ranked metrics table, one row per completed cell.
pub fn export_table_csv(rows: &[MetricsRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "rolling_period",
        "zscore_threshold",
        "annualized_return",
        "max_drawdown",
        "sharpe_ratio",
        "sortino_ratio",
        "end_value",
        "trade_count",
    ])?;
    for (i, r) in rows.iter().enumerate() {
        wtr.write_record([
            &(i + 1).to_string(),
            &r.rolling_period.to_string(),
            &format!("{}", r.zscore_threshold),
            &format!("{:.6}", r.annualized_return),
            &format!("{:.6}", r.max_drawdown),
            &format!("{:.6}", r.sharpe_ratio),
            &format!("{:.6}", r.sortino_ratio),
            &format!("{:.2}", r.end_value),
            &r.trade_count.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Equity trajectory with date and total_value columns.
pub fn export_equity_csv(equity_curve: &[ValuationPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "total_value"])?;
    for p in equity_curve {
        wtr.write_record([&p.date.to_string(), &format!("{:.2}", p.total_value)])?;
    }
    finish(wtr)
}

/// Rolling correlation series; undefined points are written as `NaN`.
pub fn export_correlation_csv(points: &[CorrelationPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "correlation"])?;
    for p in points {
        wtr.write_record([&p.date.to_string(), &format!("{:.6}", p.correlation)])?;
    }
    finish(wtr)
}

/// Fill log: date, leg, side, signed quantity, price.
pub fn export_fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "leg", "side", "quantity", "price", "notional"])?;
    for f in fills {
        let side = if f.is_buy() { "buy" } else { "sell" };
        wtr.write_record([
            &f.date.to_string(),
            &f.leg.to_string(),
            &side.to_string(),
            &format!("{:.6}", f.quantity),
            &format!("{:.6}", f.price),
            &format!("{:.2}", f.notional()),
        ])?;
    }
    finish(wtr)
}

/// Transition log: bar, date, from, to, z-score.
pub fn export_transitions_csv(transitions: &[StateTransition]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "date", "from", "to", "zscore"])?;
    for t in transitions {
        wtr.write_record([
            &t.bar_index.to_string(),
            &t.date.to_string(),
            &t.from.to_string(),
            &t.to.to_string(),
            &format!("{:.6}", t.zscore),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundles ───────────────────────────────────────────────

fn create_run_dir(output_dir: &Path, stem: &str) -> Result<PathBuf> {
    let dirname = format!("{}_{}", stem, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;
    Ok(run_dir)
}

fn write(path: PathBuf, contents: &str) -> Result<()> {
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the artifact set for a sweep.
///
/// Creates `{x}_{y}_sweep_{timestamp}/` under `output_dir` containing:
/// - `report.json`: the full `SweepReport`
/// - `table.csv`: ranked metrics table
/// - `report.md`: Markdown summary
/// - `selected_equity.csv`, `selected_correlation.csv`: when a cell was selected
///
/// Returns the path to the created directory.
pub fn save_sweep_artifacts(
    report: &SweepReport,
    selection: Option<&Selection>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let stem = format!("{}_{}_sweep", report.x_symbol, report.y_symbol);
    let run_dir = create_run_dir(output_dir, &stem)?;

    write(run_dir.join("report.json"), &export_report_json(report)?)?;
    write(run_dir.join("table.csv"), &export_table_csv(&report.rows)?)?;
    write(run_dir.join("report.md"), &generate_sweep_report(report, selection))?;

    if let Some(sel) = selection {
        write(
            run_dir.join("selected_equity.csv"),
            &export_equity_csv(&sel.equity_curve)?,
        )?;
        write(
            run_dir.join("selected_correlation.csv"),
            &export_correlation_csv(&sel.correlation)?,
        )?;
    }

    Ok(run_dir)
}

/// Save the artifact set for a single run.
///
/// Creates `{x}_{y}_run_{timestamp}/` with `manifest.json`, `equity.csv`,
/// `fills.csv` and `transitions.csv`.
pub fn save_run_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let stem = format!("{}_{}_run", result.x_symbol, result.y_symbol);
    let run_dir = create_run_dir(output_dir, &stem)?;

    write(run_dir.join("manifest.json"), &export_result_json(result)?)?;
    write(run_dir.join("equity.csv"), &export_equity_csv(&result.equity_curve)?)?;
    write(run_dir.join("fills.csv"), &export_fills_csv(&result.fills)?)?;
    write(
        run_dir.join("transitions.csv"),
        &export_transitions_csv(&result.transitions)?,
    )?;

    Ok(run_dir)
}

/// Load a sweep report from a file or from an artifact directory's `report.json`.
pub fn load_report(path: &Path) -> Result<SweepReport> {
    let file = if path.is_dir() {
        path.join("report.json")
    } else {
        path.to_path_buf()
    };
    let json = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    import_report_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Three decimals, or `n/a` for an indeterminate ratio.
pub fn fmt_ratio(v: f64) -> String {
    if v.is_nan() {
        "n/a".to_string()
    } else {
        format!("{v:.3}")
    }
}

/// Markdown table of ranked rows.
pub fn format_table(rows: &[MetricsRow]) -> String {
    let mut md = String::new();
    md.push_str("| Rank | Rolling | Z | Ann. Return | Max DD | Sharpe | Sortino | Trades |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- |\n");
    for (i, r) in rows.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} | {} | {:.2}% | {:.2}% | {} | {} | {} |\n",
            i + 1,
            r.rolling_period,
            r.zscore_threshold,
            r.annualized_return * 100.0,
            r.max_drawdown * 100.0,
            fmt_ratio(r.sharpe_ratio),
            fmt_ratio(r.sortino_ratio),
            r.trade_count,
        ));
    }
    md
}

/// Markdown summary of a sweep and (optionally) the selected cell.
pub fn generate_sweep_report(report: &SweepReport, selection: Option<&Selection>) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str(&format!(
        "# Pair Sweep: {} / {}\n\n",
        report.x_symbol, report.y_symbol
    ));

    let g = &report.grid;
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Rolling periods | {}..={} step {} |\n",
        g.rp_min, g.rp_max, g.rp_step
    ));
    md.push_str(&format!(
        "| Z thresholds | {}..={} step {} |\n",
        g.zs_min, g.zs_max, g.zs_step
    ));
    md.push_str(&format!("| Cells | {} |\n", g.size()));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    md.push('\n');

    md.push_str("## Ranked by Sharpe\n\n");
    md.push_str(&format_table(&report.rows));
    md.push('\n');

    if !report.failures.is_empty() {
        md.push_str("## Failed Cells\n\n");
        for f in &report.failures {
            md.push_str(&format!(
                "- rolling={} z={}: {}\n",
                f.rolling_period, f.zscore_threshold, f.error
            ));
        }
        md.push('\n');
    }

    if let Some(sel) = selection {
        md.push_str("## Selected\n\n");
        md.push_str(&format_table(std::slice::from_ref(&sel.row)));
        if let (Some(first), Some(last)) = (sel.equity_curve.first(), sel.equity_curve.last()) {
            md.push_str(&format!(
                "\nStarting value {:.2}, ending value {:.2}.\n",
                first.total_value, last.total_value
            ));
        }
    }

    md
}

/// Markdown summary of a single run.
pub fn generate_run_report(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut md = String::with_capacity(1024);
    md.push_str(&format!(
        "# Pair Backtest: {} / {}\n\n",
        result.x_symbol, result.y_symbol
    ));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!(
        "| Rolling / Z | {} / {} |\n",
        result.params.rolling_period, result.params.zscore_threshold
    ));
    md.push_str(&format!(
        "| Bars | {} ({} warmup) |\n",
        result.bar_count, result.warmup_bars
    ));
    md.push_str(&format!("| Starting Value | {:.2} |\n", m.start_value));
    md.push_str(&format!("| Ending Value | {:.2} |\n", m.end_value));
    md.push_str(&format!(
        "| Annualized Return | {:.2}% |\n",
        m.annualized_return * 100.0
    ));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Sharpe | {} |\n", fmt_ratio(m.sharpe_ratio)));
    md.push_str(&format!("| Sortino | {} |\n", fmt_ratio(m.sortino_ratio)));
    md.push_str(&format!(
        "| Transitions / Fills | {} / {} |\n",
        result.transitions.len(),
        result.fills.len()
    ));
    md.push_str(&format!("| Final State | {} |\n", result.final_state));
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md
}
