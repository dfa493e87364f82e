//! Backtesting engine: portfolio simulator and the bar-by-bar loop.
//!
//! The z-score series is computed once before the loop. Each bar then runs
//! in three phases:
//!
//! 1. Strategy: feed the bar's z-score, collect target-weight orders
//! 2. Execution: fill orders at the bar's close, in emission order
//! 3. Mark: append the bar's total value to the valuation history

pub mod loop_runner;
pub mod simulator;
pub mod state;

pub use loop_runner::run_pair;
pub use simulator::SimulationError;
pub use state::{EngineConfig, RunResult};
