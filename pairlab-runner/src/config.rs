//! TOML configuration for pair backtests and sweeps.
//!
//! ```toml
//! [pair]
//! x = "KO"
//! y = "PEP"
//! start_date = "2015-01-01"
//! end_date = "2020-12-31"
//!
//! [account]
//! initial_capital = 1000000.0
//! entry_weight = 1.0
//!
//! [strategy]
//! rolling_period = 100
//! zscore_threshold = 2.0
//! initial_state = "flat"
//!
//! [sweep]
//! rp_min = 50
//! rp_max = 150
//! rp_step = 50
//! zs_min = 1.0
//! zs_max = 3.0
//! zs_step = 1.0
//! max_concurrency = 4
//!
//! [analysis]
//! mar = 0.00004
//! trading_days = 252
//!
//! [data]
//! source = "csv"
//! dir = "data"
//! ```
//!
//! Only `[pair]` is required; every other section has defaults.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use pairlab_core::engine::EngineConfig;
use pairlab_core::strategy::{PairParams, PairState};

use crate::sweep::SweepGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    pub pair: PairSection,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// The two instruments and the date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSection {
    /// Regressand (first instrument).
    pub x: String,
    /// Regressor (second instrument).
    pub y: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub initial_capital: f64,
    /// Target weight of the entering leg on each transition.
    pub entry_weight: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            entry_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub rolling_period: usize,
    pub zscore_threshold: f64,
    pub initial_state: PairState,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rolling_period: 100,
            zscore_threshold: 2.0,
            initial_state: PairState::Flat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub rp_min: usize,
    pub rp_max: usize,
    pub rp_step: usize,
    pub zs_min: f64,
    pub zs_max: f64,
    pub zs_step: f64,
    /// Worker threads for the sweep; `None` uses every available core.
    pub max_concurrency: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            rp_min: 50,
            rp_max: 150,
            rp_step: 50,
            zs_min: 1.0,
            zs_max: 3.0,
            zs_step: 1.0,
            max_concurrency: None,
        }
    }
}

impl SweepConfig {
    pub fn grid(&self) -> SweepGrid {
        SweepGrid {
            rp_min: self.rp_min,
            rp_max: self.rp_max,
            rp_step: self.rp_step,
            zs_min: self.zs_min,
            zs_max: self.zs_max,
            zs_step: self.zs_step,
        }
    }
}

/// Analyzer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Daily minimum acceptable return for the Sortino ratio.
    pub mar: f64,
    /// Trading days per year used for annualization.
    pub trading_days: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mar: 0.00004,
            trading_days: 252,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[default]
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSourceKind,
    /// Directory of `<SYMBOL>.csv` files (csv source only).
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Csv,
            dir: PathBuf::from("data"),
        }
    }
}

impl PairConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: PairConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Minimal config for a pair with every other section defaulted.
    pub fn for_pair(x: &str, y: &str, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            pair: PairSection {
                x: x.to_string(),
                y: y.to_string(),
                start_date,
                end_date,
            },
            account: AccountConfig::default(),
            strategy: StrategyConfig::default(),
            sweep: SweepConfig::default(),
            analysis: AnalysisConfig::default(),
            data: DataConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.pair.x.trim().is_empty() || self.pair.y.trim().is_empty() {
            return invalid("pair.x and pair.y must be non-empty".into());
        }
        if self.pair.x == self.pair.y {
            return invalid(format!("pair.x and pair.y are both '{}'", self.pair.x));
        }
        if self.pair.start_date > self.pair.end_date {
            return invalid(format!(
                "pair.start_date {} is after pair.end_date {}",
                self.pair.start_date, self.pair.end_date
            ));
        }
        if !(self.account.initial_capital.is_finite() && self.account.initial_capital > 0.0) {
            return invalid(format!(
                "account.initial_capital must be positive, got {}",
                self.account.initial_capital
            ));
        }
        if self.analysis.trading_days == 0 {
            return invalid("analysis.trading_days must be positive".into());
        }
        if !self.analysis.mar.is_finite() {
            return invalid("analysis.mar must be finite".into());
        }
        if self.sweep.max_concurrency == Some(0) {
            return invalid("sweep.max_concurrency must be at least 1".into());
        }

        self.params()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("strategy: {e}")))?;
        self.sweep
            .grid()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("sweep: {e}")))?;
        Ok(())
    }

    /// Strategy parameters for the configured single run.
    pub fn params(&self) -> PairParams {
        PairParams {
            rolling_period: self.strategy.rolling_period,
            zscore_threshold: self.strategy.zscore_threshold,
            entry_weight: self.account.entry_weight,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.account.initial_capital)
            .with_initial_state(self.strategy.initial_state)
    }
}
