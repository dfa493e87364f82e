//! Domain types for PairLab

pub mod bar;
pub mod fill;
pub mod order;
pub mod portfolio;
pub mod position;

pub use bar::Bar;
pub use fill::Fill;
pub use order::{Leg, TargetOrder};
pub use portfolio::{LegPrices, Portfolio, ValuationPoint};
pub use position::Position;
