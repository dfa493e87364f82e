//! Portfolio: aggregate account state for one pair simulation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::order::Leg;
use super::position::Position;

/// Closing prices of both legs on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPrices {
    pub x: f64,
    pub y: f64,
}

impl LegPrices {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn get(&self, leg: Leg) -> f64 {
        match leg {
            Leg::X => self.x,
            Leg::Y => self.y,
        }
    }
}

/// One point of the valuation history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub date: NaiveDate,
    pub total_value: f64,
}

/// Aggregate account state: cash, one position per leg, and valuation history.
///
/// Positions are kept in a `BTreeMap` so that valuation sums run in a fixed
/// leg order; repeated runs then agree bit for bit.
///
/// The accounting identity holds at every mark:
/// `total_value == cash + sum(quantity * close)`.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<Leg, Position>,
    pub valuation_history: Vec<ValuationPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        let mut positions = BTreeMap::new();
        positions.insert(Leg::X, Position::flat(Leg::X));
        positions.insert(Leg::Y, Position::flat(Leg::Y));
        Self {
            cash: initial_capital,
            initial_capital,
            positions,
            valuation_history: Vec::new(),
        }
    }

    /// Total value = cash + sum of all position market values.
    pub fn total_value(&self, prices: &LegPrices) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| pos.market_value(prices.get(pos.leg)))
            .sum();
        self.cash + position_value
    }

    /// Signed quantity held on a leg (0.0 when flat).
    pub fn quantity(&self, leg: Leg) -> f64 {
        self.positions.get(&leg).map_or(0.0, |p| p.quantity)
    }

    /// Most recent marked value, or the starting capital before the first mark.
    pub fn last_value(&self) -> f64 {
        self.valuation_history
            .last()
            .map_or(self.initial_capital, |v| v.total_value)
    }
}
