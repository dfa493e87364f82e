//! Deterministic synthetic price series.
//!
//! Each symbol's walk is seeded from the BLAKE3 hash of its name, so the same
//! symbol always yields the same bars. All symbols share a common market
//! factor, which makes any two of them co-move the way a real pair does.

use super::provider::{clean_bars, next_weekday, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MARKET_SEED: &str = "pairlab-market-factor";

/// Synthetic provider for demos, benches and offline runs.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    /// Share of each daily move driven by the common factor, in [0, 1].
    pub market_share: f64,
    pub start_price: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            market_share: 0.8,
            start_price: 100.0,
        }
    }
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
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
        let raw = generate_bars(symbol, start, end, self.market_share, self.start_price);
        let (bars, dropped_rows) = clean_bars(raw, start, end);
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Synthetic,
            dropped_rows,
        })
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

fn seeded_rng(name: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(name.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

/// Generate weekday bars for `start..=end`.
pub fn generate_bars(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    market_share: f64,
    start_price: f64,
) -> Vec<Bar> {
    let mut market = seeded_rng(MARKET_SEED);
    let mut own = seeded_rng(symbol);
    let market_share = market_share.clamp(0.0, 1.0);

    let mut bars = Vec::new();
    let mut price = start_price;
    let mut current = next_weekday(start);

    while current <= end {
        let common: f64 = market.gen_range(-0.02..0.02);
        let idio: f64 = own.gen_range(-0.02..0.02);
        let daily_return = market_share * common + (1.0 - market_share) * idio;

        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + own.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - own.gen_range(0.0..0.01));
        let volume = own.gen_range(500_000..5_000_000u64);

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current = next_weekday(current + chrono::Duration::days(1));
    }

    bars
}
