//! Pair-trading state machine.
//!
//! Three states; a transition fires on a threshold crossing of the spread
//! z-score and emits two target-weight orders, exit leg first:
//!
//! | condition                          | orders               | new state          |
//! |------------------------------------|----------------------|--------------------|
//! | `z > +thr`, not `LongSpreadShortY`  | `Y -> 0`, `X -> w`   | `LongSpreadShortY` |
//! | `z < -thr`, not `ShortSpreadLongY`  | `X -> 0`, `Y -> w`   | `ShortSpreadLongY` |
//! | otherwise                          | none                 | unchanged          |

use crate::domain::{Leg, TargetOrder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::regression::zscore_at;

#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    #[error("rolling_period must be at least 2, got {0}")]
    RollingPeriodTooShort(usize),

    #[error("zscore_threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),

    #[error("entry_weight must be in [0, 1], got {0}")]
    InvalidEntryWeight(f64),

    #[error("unknown pair state '{0}' (expected flat, long_spread_short_y or short_spread_long_y)")]
    UnknownState(String),
}

/// Position state of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    #[default]
    Flat,
    /// Long X, out of Y.
    LongSpreadShortY,
    /// Out of X, long Y.
    ShortSpreadLongY,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairState::Flat => "flat",
            PairState::LongSpreadShortY => "long_spread_short_y",
            PairState::ShortSpreadLongY => "short_spread_long_y",
        };
        f.write_str(s)
    }
}

impl FromStr for PairState {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "flat" => Ok(PairState::Flat),
            "long_spread_short_y" | "long" => Ok(PairState::LongSpreadShortY),
            "short_spread_long_y" | "short" => Ok(PairState::ShortSpreadLongY),
            _ => Err(StrategyError::UnknownState(s.to_string())),
        }
    }
}

/// Strategy parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairParams {
    pub rolling_period: usize,
    pub zscore_threshold: f64,
    /// Target weight of the entering leg (1.0 = fully reinvested).
    pub entry_weight: f64,
}

impl PairParams {
    pub fn new(rolling_period: usize, zscore_threshold: f64) -> Result<Self, StrategyError> {
        let params = Self {
            rolling_period,
            zscore_threshold,
            entry_weight: 1.0,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_entry_weight(mut self, entry_weight: f64) -> Result<Self, StrategyError> {
        self.entry_weight = entry_weight;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.rolling_period < 2 {
            return Err(StrategyError::RollingPeriodTooShort(self.rolling_period));
        }
        if !self.zscore_threshold.is_finite() || self.zscore_threshold < 0.0 {
            return Err(StrategyError::InvalidThreshold(self.zscore_threshold));
        }
        if !(0.0..=1.0).contains(&self.entry_weight) {
            return Err(StrategyError::InvalidEntryWeight(self.entry_weight));
        }
        Ok(())
    }
}

/// Pure transition function.
///
/// A NaN z-score compares false against both thresholds and leaves the state
/// unchanged.
pub fn transition(
    state: PairState,
    z: f64,
    params: &PairParams,
    date: NaiveDate,
) -> (PairState, Vec<TargetOrder>) {
    let thr = params.zscore_threshold;
    let w = params.entry_weight;

    if z > thr && state != PairState::LongSpreadShortY {
        return (PairState::LongSpreadShortY, rotate_into(Leg::X, w, date));
    }
    if z < -thr && state != PairState::ShortSpreadLongY {
        return (PairState::ShortSpreadLongY, rotate_into(Leg::Y, w, date));
    }
    (state, Vec::new())
}

/// Close the other leg, then size `entering` to weight `w`.
fn rotate_into(entering: Leg, w: f64, date: NaiveDate) -> Vec<TargetOrder> {
    vec![
        TargetOrder::new(entering.other(), 0.0, date),
        TargetOrder::new(entering, w, date),
    ]
}

/// Evaluate the strategy on the bars seen so far.
///
/// `x` and `y` hold closes up to and including the current bar, whose index
/// is `x.len() - 1`. No orders are emitted while that index is below
/// `rolling_period`.
pub fn step(
    x: &[f64],
    y: &[f64],
    params: &PairParams,
    state: PairState,
    date: NaiveDate,
) -> (PairState, Vec<TargetOrder>) {
    let len = x.len().min(y.len());
    if len == 0 || len - 1 < params.rolling_period {
        return (state, Vec::new());
    }
    let z = zscore_at(&x[..len], &y[..len], params.rolling_period);
    transition(state, z, params, date)
}

/// Record of one state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub bar_index: usize,
    pub date: NaiveDate,
    pub from: PairState,
    pub to: PairState,
    pub zscore: f64,
}

/// Stateful wrapper driven by the bar loop.
#[derive(Debug, Clone)]
pub struct PairStrategy {
    params: PairParams,
    state: PairState,
    transitions: Vec<StateTransition>,
}

impl PairStrategy {
    pub fn new(params: PairParams, initial_state: PairState) -> Self {
        Self {
            params,
            state: initial_state,
            transitions: Vec::new(),
        }
    }

    pub fn params(&self) -> &PairParams {
        &self.params
    }

    pub fn state(&self) -> PairState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }

    /// Whether bar `bar_index` is past the warmup window.
    pub fn is_warm(&self, bar_index: usize) -> bool {
        bar_index >= self.params.rolling_period
    }

    /// Feed one bar's z-score. Returns the orders to execute on this bar.
    pub fn on_bar(&mut self, bar_index: usize, date: NaiveDate, z: f64) -> Vec<TargetOrder> {
        if !self.is_warm(bar_index) {
            return Vec::new();
        }
        let (next, orders) = transition(self.state, z, &self.params, date);
        if next != self.state {
            tracing::debug!(
                bar = bar_index,
                %date,
                zscore = z,
                from = %self.state,
                to = %next,
                "pair state transition"
            );
            self.transitions.push(StateTransition {
                bar_index,
                date,
                from: self.state,
                to: next,
                zscore: z,
            });
            self.state = next;
        }
        orders
    }
}
