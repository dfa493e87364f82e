//! PairLab Core: bar feed, pair-trading strategy, portfolio simulator and bar loop.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, target-weight orders, fills, positions, portfolio)
//! - Data providers and pair alignment on common dates
//! - Rolling OLS spread z-score and the three-state pair strategy
//! - Portfolio simulator and the sequential bar loop
//! - Dataset and run fingerprints
//!
//! Nothing in here spawns threads or touches the filesystem inside the loop.

pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod strategy;

pub use data::{load_pair, AlignedPair, DataError, DataProvider};
pub use domain::{Bar, Fill, Leg, LegPrices, Portfolio, TargetOrder, ValuationPoint};
pub use engine::{run_pair, EngineConfig, RunResult, SimulationError};
pub use fingerprint::{DatasetHash, RunFingerprint};
pub use strategy::{PairParams, PairState, StateTransition};
