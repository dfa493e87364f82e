//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for one instrument on one trading day.
///
/// Bars are immutable once loaded. Alignment guarantees that both legs of a
/// pair carry a bar for every date on the shared calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN or infinite (void bar).
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// A bar the simulator can fill against: no void field and a positive close.
    pub fn is_tradable(&self) -> bool {
        !self.is_void() && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
        }
    }

    #[test]
    fn bar_is_tradable() {
        assert!(sample_bar().is_tradable());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_tradable());
    }

    #[test]
    fn bar_detects_infinite_as_void() {
        let mut bar = sample_bar();
        bar.high = f64::INFINITY;
        assert!(bar.is_void());
    }

    #[test]
    fn non_positive_close_is_not_tradable() {
        let mut bar = sample_bar();
        bar.close = 0.0;
        assert!(!bar.is_void());
        assert!(!bar.is_tradable());
        bar.close = -1.0;
        assert!(!bar.is_tradable());
    }
}
