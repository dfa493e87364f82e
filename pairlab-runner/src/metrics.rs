//! Analyzer set: pure functions over the valuation history.
//!
//! Every metric is a pure function: values in, scalar out. The ratio
//! functions return `Indeterminate` when their denominator vanishes;
//! `PerformanceMetrics::compute` recovers that to NaN so the run still
//! completes and stays rankable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AnalysisConfig;

/// A ratio whose denominator is zero or undefined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("indeterminate {metric}: {reason}")]
pub struct Indeterminate {
    pub metric: &'static str,
    pub reason: &'static str,
}

/// Running mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    pub fn population_std(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        (self.m2 / self.count as f64).max(0.0).sqrt()
    }

    pub fn sample_std(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        (self.m2 / (self.count - 1) as f64).max(0.0).sqrt()
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = RunningStats::new();
        for v in iter {
            stats.push(v);
        }
        stats
    }
}

/// Standard deviations at or below this are treated as zero.
const ZERO_STD: f64 = 1e-15;

// ─── Individual metric functions ────────────────────────────────────

/// Daily log returns `ln(v[t] / v[t-1])`. Non-positive values give NaN.
pub fn log_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 && w[1] > 0.0 {
                (w[1] / w[0]).ln()
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Geometric growth from first to last value, annualized.
///
/// `(last / first) ^ (trading_days / n_returns) - 1`; 0.0 for fewer than two
/// values.
pub fn annualized_return(values: &[f64], trading_days: u32) -> f64 {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return 0.0;
    };
    let periods = values.len() - 1;
    if periods == 0 {
        return 0.0;
    }
    if first <= 0.0 || last < 0.0 {
        return f64::NAN;
    }
    (last / first).powf(trading_days as f64 / periods as f64) - 1.0
}

/// Maximum peak-to-trough decline as a fraction in [0, 1].
///
/// 0.0 for a non-decreasing trajectory.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (peak - v) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd.min(1.0)
}

/// Annualized Sharpe ratio of daily log returns.
///
/// `mean / pstdev * sqrt(trading_days)`, no risk-free rate.
pub fn sharpe_ratio(values: &[f64], trading_days: u32) -> Result<f64, Indeterminate> {
    let returns = log_returns(values);
    if returns.len() < 2 {
        return Err(Indeterminate {
            metric: "sharpe",
            reason: "fewer than two returns",
        });
    }
    let stats: RunningStats = returns.into_iter().collect();
    let std = stats.population_std();
    if !std.is_finite() || std <= ZERO_STD {
        return Err(Indeterminate {
            metric: "sharpe",
            reason: "zero return volatility",
        });
    }
    Ok(stats.mean() / std * (trading_days as f64).sqrt())
}

/// Annualized Sortino ratio of daily log returns.
///
/// ```text
/// numerator   = (mean(r) - mar) * trading_days
/// denominator = sstdev(r | r < 0) * sqrt(trading_days)
/// ```
///
/// Needs at least two negative returns with non-zero spread.
pub fn sortino_ratio(values: &[f64], mar: f64, trading_days: u32) -> Result<f64, Indeterminate> {
    let returns = log_returns(values);
    if returns.is_empty() {
        return Err(Indeterminate {
            metric: "sortino",
            reason: "no returns",
        });
    }
    let all: RunningStats = returns.iter().copied().collect();
    let downside: RunningStats = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.count() < 2 {
        return Err(Indeterminate {
            metric: "sortino",
            reason: "fewer than two negative returns",
        });
    }
    let downside_std = downside.sample_std();
    if !downside_std.is_finite() || downside_std <= ZERO_STD {
        return Err(Indeterminate {
            metric: "sortino",
            reason: "zero downside deviation",
        });
    }
    let days = trading_days as f64;
    Ok((all.mean() - mar) * days / (downside_std * days.sqrt()))
}

/// Rolling Pearson correlation of two series over `n` bars.
///
/// NaN before bar `n-1` and wherever either window has zero variance.
pub fn rolling_correlation(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    let len = x.len().min(y.len());
    (0..len)
        .map(|t| {
            if n < 2 || t + 1 < n {
                return f64::NAN;
            }
            pearson(&x[t + 1 - n..=t], &y[t + 1 - n..=t])
        })
        .collect()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    let denom = (sxx * syy).sqrt();
    if !denom.is_finite() || denom <= ZERO_STD {
        return f64::NAN;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

/// Aggregate performance metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(with = "crate::serde_nan")]
    pub annualized_return: f64,
    pub max_drawdown: f64,
    /// NaN when indeterminate.
    #[serde(with = "crate::serde_nan")]
    pub sharpe_ratio: f64,
    /// NaN when indeterminate.
    #[serde(with = "crate::serde_nan")]
    pub sortino_ratio: f64,
    pub total_return: f64,
    #[serde(with = "crate::serde_nan")]
    pub start_value: f64,
    #[serde(with = "crate::serde_nan")]
    pub end_value: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from the total-value series.
    pub fn compute(values: &[f64], analysis: &AnalysisConfig) -> Self {
        let start_value = values.first().copied().unwrap_or(f64::NAN);
        let end_value = values.last().copied().unwrap_or(f64::NAN);
        let total_return = if values.len() >= 2 && start_value > 0.0 {
            end_value / start_value - 1.0
        } else {
            0.0
        };

        Self {
            annualized_return: annualized_return(values, analysis.trading_days),
            max_drawdown: max_drawdown(values),
            sharpe_ratio: recover(sharpe_ratio(values, analysis.trading_days)),
            sortino_ratio: recover(sortino_ratio(values, analysis.mar, analysis.trading_days)),
            total_return,
            start_value,
            end_value,
        }
    }
}

fn recover(ratio: Result<f64, Indeterminate>) -> f64 {
    ratio.unwrap_or_else(|e| {
        tracing::debug!(%e, "metric recovered as NaN");
        f64::NAN
    })
}
