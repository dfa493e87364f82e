use serde::{Deserialize, Serialize};

use super::order::Leg;

/// Position tracking. Quantity may be fractional under weight-based sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub leg: Leg,
    pub quantity: f64,
}

impl Position {
    pub fn flat(leg: Leg) -> Self {
        Self { leg, quantity: 0.0 }
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }
}
