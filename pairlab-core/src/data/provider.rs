//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (CSV directory,
//! in-memory series, synthetic walks) so the pipeline can swap implementations
//! and mock for tests.

use crate::domain::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no usable price history for '{symbol}' in {start}..={end}")]
    DataUnavailable {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("malformed data file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of a successful data fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// Rows discarded because a field was missing or non-finite.
    pub dropped_rows: usize,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    CsvImport,
    InMemory,
    Synthetic,
}

/// Trait for price-series providers.
///
/// Implementations return bars for `start..=end`, ordered by date, with
/// incomplete rows already removed. An empty result is not an error at this
/// level; `load_pair` turns it into `DataUnavailable`.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Whether the bars are generated rather than observed.
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Drop bars that are void or have a non-positive close, restrict to
/// `start..=end`, sort by date and keep the first bar seen for any duplicated
/// date.
///
/// Returns the cleaned bars and the number of untradable rows removed.
pub fn clean_bars(bars: Vec<Bar>, start: NaiveDate, end: NaiveDate) -> (Vec<Bar>, usize) {
    let total = bars.len();
    let void = bars.iter().filter(|b| b.is_void()).count();
    let mut kept: Vec<Bar> = bars.into_iter().filter(Bar::is_tradable).collect();
    let dropped = total - kept.len();
    if dropped > void {
        tracing::debug!(
            non_positive_close = dropped - void,
            void,
            "dropped untradable bars"
        );
    }

    kept.retain(|b| b.date >= start && b.date <= end);
    kept.sort_by_key(|b| b.date);
    kept.dedup_by_key(|b| b.date);
    (kept, dropped)
}

/// Provider backed by bars already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, Vec<Bar>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bars for a symbol.
    pub fn with_series(mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.series.insert(symbol.into(), bars);
        self
    }

    /// Register a close-only series starting at `start` on consecutive weekdays.
    pub fn with_closes(self, symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        self.with_series(symbol, bars_from_closes(start, closes))
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let raw = self.series.get(symbol).cloned().unwrap_or_default();
        let (bars, dropped_rows) = clean_bars(raw, start, end);
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::InMemory,
            dropped_rows,
        })
    }
}

/// Build weekday bars whose OHLC all equal the given close.
pub fn bars_from_closes(start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
    let mut date = start;
    closes
        .iter()
        .map(|&close| {
            date = next_weekday(date);
            let bar = Bar {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            };
            date = date + chrono::Duration::days(1);
            bar
        })
        .collect()
}

/// `date` itself if it is a weekday, otherwise the following Monday.
pub(crate) fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    use chrono::{Datelike, Weekday};
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date + chrono::Duration::days(1);
    }
    date
}
