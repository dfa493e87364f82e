//! Pair alignment on the intersection of trading dates.
//!
//! Unlike a union timeline with void bars, a pair backtest needs both closes
//! on every bar, so any date missing from either leg is dropped.

use super::provider::{DataError, DataProvider};
use crate::domain::{Bar, LegPrices};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Two bar series on a shared, strictly increasing date axis.
///
/// Invariant: `dates.len() == x.len() == y.len()` and `x[i].date == y[i].date == dates[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub x_symbol: String,
    pub y_symbol: String,
    pub dates: Vec<NaiveDate>,
    pub x: Vec<Bar>,
    pub y: Vec<Bar>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn x_closes(&self) -> Vec<f64> {
        self.x.iter().map(|b| b.close).collect()
    }

    pub fn y_closes(&self) -> Vec<f64> {
        self.y.iter().map(|b| b.close).collect()
    }

    /// Closing prices of both legs on bar `t`.
    pub fn prices_at(&self, t: usize) -> LegPrices {
        LegPrices::new(self.x[t].close, self.y[t].close)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// Intersect two cleaned bar series on date.
///
/// Dates are matched exactly; input order does not matter. Fails with
/// `DataUnavailable` when the two series have no date in common.
pub fn align_pair(
    x_symbol: &str,
    x_bars: Vec<Bar>,
    y_symbol: &str,
    y_bars: Vec<Bar>,
) -> Result<AlignedPair, DataError> {
    let y_by_date: BTreeMap<NaiveDate, Bar> = y_bars.into_iter().map(|b| (b.date, b)).collect();
    let x_by_date: BTreeMap<NaiveDate, Bar> = x_bars.into_iter().map(|b| (b.date, b)).collect();

    let mut dates = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (date, x_bar) in x_by_date {
        if let Some(y_bar) = y_by_date.get(&date) {
            dates.push(date);
            x.push(x_bar);
            y.push(y_bar.clone());
        }
    }

    if dates.is_empty() {
        return Err(DataError::DataUnavailable {
            symbol: format!("{x_symbol}/{y_symbol}"),
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        });
    }

    Ok(AlignedPair {
        x_symbol: x_symbol.to_string(),
        y_symbol: y_symbol.to_string(),
        dates,
        x,
        y,
    })
}

/// Fetch both legs from a provider and align them.
///
/// Fails with `DataUnavailable` if either leg has no bars in range or the
/// two legs share no dates. No partial result is returned.
pub fn load_pair(
    provider: &dyn DataProvider,
    x_symbol: &str,
    y_symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<AlignedPair, DataError> {
    let x = provider.fetch(x_symbol, start, end)?;
    let y = provider.fetch(y_symbol, start, end)?;

    for leg in [&x, &y] {
        if leg.bars.is_empty() {
            return Err(DataError::DataUnavailable {
                symbol: leg.symbol.clone(),
                start,
                end,
            });
        }
        if leg.dropped_rows > 0 {
            tracing::debug!(
                symbol = %leg.symbol,
                dropped = leg.dropped_rows,
                "dropped incomplete rows"
            );
        }
    }

    let x_count = x.bars.len();
    let y_count = y.bars.len();
    let pair = align_pair(x_symbol, x.bars, y_symbol, y.bars).map_err(|_| {
        DataError::DataUnavailable {
            symbol: format!("{x_symbol}/{y_symbol}"),
            start,
            end,
        }
    })?;

    tracing::info!(
        provider = provider.name(),
        x = x_symbol,
        y = y_symbol,
        x_bars = x_count,
        y_bars = y_count,
        aligned = pair.len(),
        "aligned pair"
    );
    Ok(pair)
}
