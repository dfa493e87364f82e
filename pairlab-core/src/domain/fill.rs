use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::order::Leg;

/// Executed quantity change on one leg. Positive quantity buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub date: NaiveDate,
    pub leg: Leg,
    pub quantity: f64,
    pub price: f64,
}

impl Fill {
    pub fn is_buy(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.price
    }
}
