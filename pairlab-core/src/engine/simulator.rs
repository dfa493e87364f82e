//! Target-weight execution and bar-close marking.

use crate::domain::{Fill, Leg, LegPrices, Portfolio, Position, TargetOrder, ValuationPoint};
use chrono::NaiveDate;
use thiserror::Error;

use crate::strategy::StrategyError;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("target weight {weight} for leg {leg} is outside [0, 1]")]
    InvalidWeight { leg: Leg, weight: f64 },

    #[error("leg {leg} has unusable close {price} on {date}")]
    InvalidPrice {
        leg: Leg,
        date: NaiveDate,
        price: f64,
    },

    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] StrategyError),
}

impl Portfolio {
    /// Resize one leg to `target_weight` of total account value at the close.
    ///
    /// Sizing uses the total value at the moment of execution, so an exit
    /// order processed first frees cash for the entry that follows it.
    /// Weights outside `[0, 1]` (or NaN) are rejected, never clamped.
    ///
    /// Returns the fill, or `None` when the leg is already at target.
    pub fn execute(
        &mut self,
        order: &TargetOrder,
        prices: &LegPrices,
    ) -> Result<Option<Fill>, SimulationError> {
        let weight = order.target_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(SimulationError::InvalidWeight {
                leg: order.leg,
                weight,
            });
        }

        let price = prices.get(order.leg);
        if !price.is_finite() || price <= 0.0 {
            return Err(SimulationError::InvalidPrice {
                leg: order.leg,
                date: order.requested_date,
                price,
            });
        }

        let total = self.total_value(prices);
        let target_qty = weight * total / price;
        let current = self.quantity(order.leg);
        let delta = target_qty - current;
        if delta == 0.0 {
            return Ok(None);
        }

        self.cash -= delta * price;
        self.positions
            .entry(order.leg)
            .or_insert_with(|| Position::flat(order.leg))
            .quantity = target_qty;

        let fill = Fill {
            date: order.requested_date,
            leg: order.leg,
            quantity: delta,
            price,
        };
        tracing::trace!(
            date = %fill.date,
            leg = %fill.leg,
            quantity = fill.quantity,
            price = fill.price,
            cash = self.cash,
            "fill"
        );
        Ok(Some(fill))
    }

    /// Append `(date, total_value)` to the valuation history.
    pub fn mark(&mut self, date: NaiveDate, prices: &LegPrices) -> f64 {
        let total_value = self.total_value(prices);
        self.valuation_history.push(ValuationPoint { date, total_value });
        total_value
    }
}
