//! Run fingerprinting: deterministic identification of datasets and runs.
//!
//! Identical data and parameters always yield the same fingerprint, which
//! is what the idempotence checks compare against.

use crate::data::AlignedPair;
use crate::engine::EngineConfig;
use crate::strategy::PairParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hash over the aligned pair (symbols, dates and every OHLCV field).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(pair: &AlignedPair) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(pair.x_symbol.as_bytes());
        hasher.update(b"\0");
        hasher.update(pair.y_symbol.as_bytes());
        hasher.update(b"\0");
        for (x, y) in pair.x.iter().zip(&pair.y) {
            hasher.update(x.date.to_string().as_bytes());
            for bar in [x, y] {
                for v in [bar.open, bar.high, bar.low, bar.close] {
                    hasher.update(&v.to_le_bytes());
                }
                hasher.update(&bar.volume.to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one simulation: dataset + parameters + account setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub dataset_hash: DatasetHash,
    pub params: PairParams,
    pub engine: EngineConfig,
}

impl RunFingerprint {
    pub fn new(dataset_hash: DatasetHash, params: PairParams, engine: EngineConfig) -> Self {
        Self {
            dataset_hash,
            params,
            engine,
        }
    }

    /// Stable hex hash of the canonical JSON form.
    pub fn hash(&self) -> String {
        let canonical = serde_json::json!({
            "dataset_hash": &self.dataset_hash.0,
            "rolling_period": self.params.rolling_period,
            "zscore_threshold": self.params.zscore_threshold.to_bits(),
            "entry_weight": self.params.entry_weight.to_bits(),
            "initial_capital": self.engine.initial_capital.to_bits(),
            "initial_state": self.engine.initial_state.to_string(),
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{align_pair, bars_from_closes};
    use chrono::NaiveDate;

    fn pair(last_x: f64) -> AlignedPair {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        align_pair(
            "KO",
            bars_from_closes(start, &[1.0, 2.0, last_x]),
            "PEP",
            bars_from_closes(start, &[3.0, 4.0, 5.0]),
        )
        .unwrap()
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        assert_eq!(DatasetHash::of(&pair(3.0)), DatasetHash::of(&pair(3.0)));
    }

    #[test]
    fn dataset_hash_sees_price_changes() {
        assert_ne!(DatasetHash::of(&pair(3.0)), DatasetHash::of(&pair(3.0000001)));
    }

    #[test]
    fn run_hash_changes_with_params() {
        let ds = DatasetHash::of(&pair(3.0));
        let a = RunFingerprint::new(
            ds.clone(),
            PairParams::new(50, 1.0).unwrap(),
            EngineConfig::default(),
        );
        let b = RunFingerprint::new(ds, PairParams::new(50, 2.0).unwrap(), EngineConfig::default());
        assert_eq!(a.hash(), a.clone().hash());
        assert_ne!(a.hash(), b.hash());
    }
}
