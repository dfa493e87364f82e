//! Pair-trading strategy: rolling regression spread and the state machine.

pub mod regression;
pub mod state_machine;

pub use regression::{rolling_spread, zscore_at, zscore_series, OlsFit};
pub use state_machine::{
    step, transition, PairParams, PairState, PairStrategy, StateTransition, StrategyError,
};
