//! CSV directory provider: one `<SYMBOL>.csv` file per instrument.
//!
//! Expected columns (header names are matched case-insensitively, extra
//! columns such as `Adj Close` are ignored): `date, open, high, low, close,
//! volume`. Rows where any of these is empty, unparseable or non-finite are
//! dropped before the bars reach alignment.

use super::provider::{clean_bars, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Reads `<dir>/<SYMBOL>.csv` files.
#[derive(Debug, Clone)]
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl DataProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv"
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
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }

        let (raw, unparseable) = read_bars(&path)?;
        let (bars, untradable) = clean_bars(raw, start, end);
        tracing::debug!(
            symbol,
            path = %path.display(),
            bars = bars.len(),
            dropped = unparseable + untradable,
            "loaded csv series"
        );

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvImport,
            dropped_rows: unparseable + untradable,
        })
    }
}

/// Parse every row of a CSV file into bars.
///
/// Returns the parsed bars and the number of rows that could not be parsed.
pub fn read_bars(path: &Path) -> Result<(Vec<Bar>, usize), DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let mut index = [0usize; 6];
    for (slot, name) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DataError::Malformed {
                path: path.to_path_buf(),
                reason: format!("missing column '{name}'"),
            })?;
    }

    let mut bars = Vec::new();
    let mut skipped = 0;
    for record in reader.records() {
        let record = record?;
        match parse_row(&record, &index) {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }
    Ok((bars, skipped))
}

fn parse_row(record: &csv::StringRecord, index: &[usize; 6]) -> Option<Bar> {
    let field = |i: usize| record.get(index[i]).filter(|s| !s.is_empty());
    let number = |i: usize| -> Option<f64> {
        let value: f64 = field(i)?.parse().ok()?;
        value.is_finite().then_some(value)
    };

    let date_text = field(0)?;
    // Accept both `2024-01-02` and `2024-01-02 00:00:00`.
    let date = NaiveDate::parse_from_str(date_text.get(..10)?, "%Y-%m-%d").ok()?;
    let volume = number(5)?;
    if volume < 0.0 {
        return None;
    }

    Some(Bar {
        date,
        open: number(1)?,
        high: number(2)?,
        low: number(3)?,
        close: number(4)?,
        volume: volume as u64,
    })
}
