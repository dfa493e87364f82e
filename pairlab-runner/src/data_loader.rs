//! Pair loading for the runner.
//!
//! Resolves the configured data source to a provider, loads and aligns both
//! legs once, and fingerprints the result. The aligned pair is then shared
//! read-only by every run and sweep cell.

use thiserror::Error;

use pairlab_core::data::{
    load_pair, AlignedPair, CsvDirProvider, DataError, DataProvider, SyntheticProvider,
};
use pairlab_core::fingerprint::DatasetHash;

use crate::config::{DataSourceKind, PairConfig};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Aligned pair plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedPair {
    pub pair: AlignedPair,
    /// BLAKE3 over all aligned bar data.
    pub dataset_hash: DatasetHash,
    /// Whether the bars came from the synthetic generator.
    pub is_synthetic: bool,
}

/// Build the provider named by the `[data]` section.
pub fn provider_for(config: &PairConfig) -> Box<dyn DataProvider> {
    match config.data.source {
        DataSourceKind::Csv => Box::new(CsvDirProvider::new(config.data.dir.clone())),
        DataSourceKind::Synthetic => Box::new(SyntheticProvider::new()),
    }
}

/// Load the configured pair through the configured provider.
pub fn load_configured_pair(config: &PairConfig) -> Result<LoadedPair, LoadError> {
    let provider = provider_for(config);
    load_with(provider.as_ref(), config)
}

/// Load the configured pair through an explicit provider.
pub fn load_with(provider: &dyn DataProvider, config: &PairConfig) -> Result<LoadedPair, LoadError> {
    let pair = load_pair(
        provider,
        &config.pair.x,
        &config.pair.y,
        config.pair.start_date,
        config.pair.end_date,
    )?;
    let dataset_hash = DatasetHash::of(&pair);
    let is_synthetic = provider.is_synthetic();
    if is_synthetic {
        tracing::warn!(
            x = %config.pair.x,
            y = %config.pair.y,
            "using synthetic bars; results do not reflect market data"
        );
    }
    Ok(LoadedPair {
        pair,
        dataset_hash,
        is_synthetic,
    })
}
