//! Engine configuration and run result types.

use crate::domain::{Fill, ValuationPoint};
use crate::strategy::{PairState, StateTransition};
use serde::{Deserialize, Serialize};

/// Account-level configuration for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// State the strategy starts in (normally `Flat`).
    pub initial_state: PairState,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            initial_state: PairState::Flat,
        }
    }

    pub fn with_initial_state(mut self, initial_state: PairState) -> Self {
        self.initial_state = initial_state;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(1_000_000.0)
    }
}

/// Output of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// One point per aligned bar, in date order.
    pub equity_curve: Vec<ValuationPoint>,
    pub fills: Vec<Fill>,
    pub transitions: Vec<StateTransition>,
    pub final_state: PairState,
    pub start_value: f64,
    pub end_value: f64,
    /// Bars before the first one eligible for a transition.
    pub warmup_bars: usize,
}

impl RunResult {
    pub fn bar_count(&self) -> usize {
        self.equity_curve.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.total_value).collect()
    }

    pub fn trade_count(&self) -> usize {
        self.fills.len()
    }
}
