//! Rolling ordinary-least-squares spread and its z-score.
//!
//! At bar `t` the regression of X on Y (with intercept) is re-estimated over
//! the trailing `n` bars `t-n+1..=t`:
//!
//! ```text
//! slope     = cov(x, y) / var(y)
//! intercept = mean(x) - slope * mean(y)
//! spread_t  = x_t - (slope * y_t + intercept)
//! z_t       = (spread_t - mean(spread window)) / pstdev(spread window)
//! ```
//!
//! The spread is defined from bar `n-1`, the z-score from bar `2n-2`. Any
//! undefined value is NaN and never triggers a transition.

/// Relative tolerance below which a variance is treated as zero.
const DEGENERATE_TOL: f64 = 1e-12;

/// One OLS fit of X on Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsFit {
    pub slope: f64,
    pub intercept: f64,
}

impl OlsFit {
    /// Fit X on Y over equal-length windows using centered sums.
    ///
    /// Returns `None` if the windows are shorter than two points, contain a
    /// non-finite value, or Y does not vary.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < 2 || y.len() != n {
            return None;
        }
        let mean_x = mean(x)?;
        let mean_y = mean(y)?;

        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (xi, yi) in x.iter().zip(y) {
            let dy = yi - mean_y;
            sxy += (xi - mean_x) * dy;
            syy += dy * dy;
        }

        let scale = (mean_y * mean_y).max(f64::MIN_POSITIVE) * n as f64;
        if !syy.is_finite() || syy <= DEGENERATE_TOL * scale {
            return None;
        }

        let slope = sxy / syy;
        Some(Self {
            slope,
            intercept: mean_x - slope * mean_y,
        })
    }

    pub fn residual(&self, x: f64, y: f64) -> f64 {
        x - (self.slope * y + self.intercept)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Spread at bar `t` from the regression over `t+1-n..=t`.
fn spread_at(x: &[f64], y: &[f64], t: usize, n: usize) -> f64 {
    if n < 2 || t + 1 < n {
        return f64::NAN;
    }
    let lo = t + 1 - n;
    match OlsFit::fit(&x[lo..=t], &y[lo..=t]) {
        Some(fit) => fit.residual(x[t], y[t]),
        None => f64::NAN,
    }
}

/// Standardize the last element of `window` against the whole window.
///
/// `price_scale` sets the floor under which the window's deviation counts as
/// zero; a perfectly linear pair otherwise yields z-scores of pure rounding
/// noise.
fn standardize(window: &[f64], price_scale: f64) -> f64 {
    let Some(m) = mean(window) else {
        return f64::NAN;
    };
    let var = window.iter().map(|s| (s - m) * (s - m)).sum::<f64>() / window.len() as f64;
    let std = var.sqrt();
    let floor = DEGENERATE_TOL.sqrt() * price_scale.abs().max(1.0);
    if !std.is_finite() || std <= floor {
        return f64::NAN;
    }
    match window.last() {
        Some(last) => (last - m) / std,
        None => f64::NAN,
    }
}

/// Rolling regression residual for every bar (NaN before bar `n-1`).
pub fn rolling_spread(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    let len = x.len().min(y.len());
    (0..len).map(|t| spread_at(x, y, t, n)).collect()
}

/// Rolling z-score of the spread for every bar (NaN before bar `2n-2`).
pub fn zscore_series(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    let spread = rolling_spread(x, y, n);
    (0..spread.len())
        .map(|t| {
            if n < 2 || t + 1 < n {
                return f64::NAN;
            }
            standardize(&spread[t + 1 - n..=t], x[t])
        })
        .collect()
}

/// Z-score at the last bar, using only the bars passed in.
///
/// Produces exactly the value `zscore_series(x, y, n)` has at the same index.
pub fn zscore_at(x: &[f64], y: &[f64], n: usize) -> f64 {
    let len = x.len().min(y.len());
    if n < 2 || len + 2 < 2 * n {
        return f64::NAN;
    }
    let t = len - 1;
    let window: Vec<f64> = (t + 1 - n..=t).map(|i| spread_at(x, y, i, n)).collect();
    standardize(&window, x[t])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavy(len: usize, phase: f64) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + 5.0 * ((i as f64) * 0.37 + phase).sin() + 0.1 * i as f64)
            .collect()
    }

    /// Period-10 Y with X = 2Y + 10, bumped by +5 at bar 20 and -5 at bar 40.
    fn shocked_line(len: usize) -> (Vec<f64>, Vec<f64>) {
        let y: Vec<f64> = (0..len)
            .map(|t| 100.0 + 5.0 * (std::f64::consts::TAU * t as f64 / 10.0).sin())
            .collect();
        let mut x: Vec<f64> = y.iter().map(|v| 2.0 * v + 10.0).collect();
        x[20] += 5.0;
        x[40] -= 5.0;
        (x, y)
    }

    /// Textbook rolling regression: raw sums, then population z of the residuals.
    fn naive_zscores(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
        let nf = n as f64;
        let mut spread = vec![f64::NAN; x.len()];
        for t in n - 1..x.len() {
            let (xs, ys) = (&x[t + 1 - n..=t], &y[t + 1 - n..=t]);
            let sx: f64 = xs.iter().sum();
            let sy: f64 = ys.iter().sum();
            let sxy: f64 = xs.iter().zip(ys).map(|(a, b)| a * b).sum();
            let syy: f64 = ys.iter().map(|b| b * b).sum();
            let slope = (nf * sxy - sx * sy) / (nf * syy - sy * sy);
            let intercept = (sx - slope * sy) / nf;
            spread[t] = x[t] - slope * y[t] - intercept;
        }
        let mut z = vec![f64::NAN; x.len()];
        for t in 2 * n - 2..x.len() {
            let w = &spread[t + 1 - n..=t];
            let m = w.iter().sum::<f64>() / nf;
            let sd = (w.iter().map(|s| (s - m).powi(2)).sum::<f64>() / nf).sqrt();
            z[t] = (spread[t] - m) / sd;
        }
        z
    }

    #[test]
    fn zscore_matches_naive_rolling_regression() {
        let x = wavy(200, 0.0);
        let y = wavy(200, 1.3);
        let n = 15;
        let ours = zscore_series(&x, &y, n);
        let reference = naive_zscores(&x, &y, n);
        for (t, (a, b)) in ours.iter().zip(&reference).enumerate() {
            assert_eq!(a.is_nan(), b.is_nan(), "definedness differs at bar {t}");
            if a.is_finite() {
                assert!((a - b).abs() < 1e-8, "bar {t}: {a} vs {b}");
            }
        }
        assert!(ours[2 * n - 2..].iter().any(|z| z.abs() > 1.0));
    }

    #[test]
    fn isolated_shock_scores_plus_and_minus_three() {
        // With every other residual zero, a lone spread in a window of 10
        // sits sqrt(9) standard deviations from the mean.
        let (x, y) = shocked_line(60);
        let z = zscore_series(&x, &y, 10);

        assert!(z[..20].iter().all(|v| v.is_nan()));
        assert!((z[20] - 3.0).abs() < 1e-9, "z[20] = {}", z[20]);
        assert!((z[40] + 3.0).abs() < 1e-9, "z[40] = {}", z[40]);

        // The next bar's residual is -shock/10 against a window still holding
        // the +0.9 * shock spread: (-0.1 - 0.08) / sqrt(0.0756).
        let expected = -0.18 / 0.0756_f64.sqrt();
        assert!((z[21] - expected).abs() < 1e-9, "z[21] = {}", z[21]);
        assert!(z[39].is_nan());
    }

    #[test]
    fn ols_recovers_exact_line() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let x: Vec<f64> = y.iter().map(|v| 2.0 * v + 3.0).collect();
        let fit = OlsFit::fit(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 3.0).abs() < 1e-12);
        assert!(fit.residual(13.0, 5.0).abs() < 1e-12);
    }

    #[test]
    fn ols_rejects_constant_regressor() {
        assert!(OlsFit::fit(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_none());
        assert!(OlsFit::fit(&[1.0, 2.0, 3.0], &[0.1, 0.1, 0.1]).is_none());
    }

    #[test]
    fn ols_rejects_non_finite() {
        assert!(OlsFit::fit(&[1.0, f64::NAN], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn spread_defined_from_window_end() {
        let x = wavy(30, 0.0);
        let y = wavy(30, 1.3);
        let spread = rolling_spread(&x, &y, 10);
        assert!(spread[..9].iter().all(|s| s.is_nan()));
        assert!(spread[9..].iter().all(|s| s.is_finite()));
    }

    #[test]
    fn zscore_defined_from_2n_minus_2() {
        let x = wavy(40, 0.0);
        let y = wavy(40, 1.3);
        let z = zscore_series(&x, &y, 10);
        assert!(z[..18].iter().all(|v| v.is_nan()));
        assert!(z[18..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zscore_at_matches_series_bit_for_bit() {
        let x = wavy(60, 0.2);
        let y = wavy(60, 2.1);
        let series = zscore_series(&x, &y, 12);
        for t in 0..x.len() {
            let point = zscore_at(&x[..=t], &y[..=t], 12);
            assert_eq!(point.to_bits(), series[t].to_bits(), "mismatch at bar {t}");
        }
    }

    #[test]
    fn flat_prices_give_nan_zscores() {
        let x = vec![50.0; 40];
        let y = vec![80.0; 40];
        assert!(zscore_series(&x, &y, 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn window_below_two_is_undefined() {
        let x = wavy(10, 0.0);
        let y = wavy(10, 1.0);
        assert!(zscore_series(&x, &y, 1).iter().all(|v| v.is_nan()));
        assert!(zscore_at(&x, &y, 0).is_nan());
    }
}
