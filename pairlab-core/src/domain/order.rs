//! Target-weight orders emitted by the strategy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of the traded pair.
///
/// `X` is the regressand (first instrument), `Y` the regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Leg {
    X,
    Y,
}

impl Leg {
    /// The other leg of the pair.
    pub fn other(self) -> Self {
        match self {
            Leg::X => Leg::Y,
            Leg::Y => Leg::X,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::X => write!(f, "X"),
            Leg::Y => write!(f, "Y"),
        }
    }
}

/// Resize a leg so that it represents `target_weight` of total account value.
///
/// Transient: created by the strategy and consumed by the simulator on the
/// same bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetOrder {
    pub leg: Leg,
    pub target_weight: f64,
    pub requested_date: NaiveDate,
}

impl TargetOrder {
    pub fn new(leg: Leg, target_weight: f64, requested_date: NaiveDate) -> Self {
        Self {
            leg,
            target_weight,
            requested_date,
        }
    }

}
