//! Bar-by-bar event loop.

use crate::data::AlignedPair;
use crate::strategy::{zscore_series, PairParams, PairStrategy};
use crate::domain::Portfolio;

use super::simulator::SimulationError;
use super::state::{EngineConfig, RunResult};

/// Run one pair backtest over aligned data.
///
/// This is the main entry point for the engine. It:
/// 1. Validates parameters
/// 2. Precomputes the rolling z-score series from both close series
/// 3. Runs the bar loop (strategy, execution, mark)
/// 4. Returns `RunResult`
///
/// The run is a pure function of its inputs; nothing is shared across runs.
pub fn run_pair(
    pair: &AlignedPair,
    params: &PairParams,
    config: &EngineConfig,
) -> Result<RunResult, SimulationError> {
    params.validate()?;

    let x = pair.x_closes();
    let y = pair.y_closes();
    let zscores = zscore_series(&x, &y, params.rolling_period);

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut strategy = PairStrategy::new(*params, config.initial_state);
    let mut fills = Vec::new();

    for (t, &date) in pair.dates.iter().enumerate() {
        let prices = pair.prices_at(t);

        let before = strategy.state();
        let orders = strategy.on_bar(t, date, zscores[t]);
        // One order lifecycle per bar: orders only accompany a state change.
        debug_assert!(orders.is_empty() || strategy.state() != before);

        for order in &orders {
            if let Some(fill) = portfolio.execute(order, &prices)? {
                fills.push(fill);
            }
        }

        portfolio.mark(date, &prices);
    }

    let start_value = config.initial_capital;
    let end_value = portfolio.last_value();
    let final_state = strategy.state();
    let transitions = strategy.into_transitions();

    tracing::debug!(
        rolling_period = params.rolling_period,
        zscore_threshold = params.zscore_threshold,
        bars = pair.len(),
        transitions = transitions.len(),
        fills = fills.len(),
        start_value,
        end_value,
        "run complete"
    );

    Ok(RunResult {
        equity_curve: portfolio.valuation_history,
        fills,
        transitions,
        final_state,
        start_value,
        end_value,
        warmup_bars: params.rolling_period.min(pair.len()),
    })
}
