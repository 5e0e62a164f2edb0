//! Statistics helpers shared by the uncertainty strategies.
//!
//! Quantiles use linear interpolation between order statistics (position
//! `q * (n - 1)` in the sorted sample), so `q = 0` and `q = 1` return the
//! sample minimum and maximum.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

use crate::error::{Result, UncertaintyError};

/// Mean of a data slice, 0.0 when empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().mean()
}

/// Sample standard deviation, 0.0 with fewer than two values.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    data.iter().std_dev()
}

/// Sorted copy of `data`. NaNs sort last.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Empirical quantile of an already sorted, non-empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Empirical quantile of unsorted data. Fails on an empty sample.
pub fn empirical_quantile(data: &[f64], q: f64) -> Result<f64> {
    if data.is_empty() {
        return Err(UncertaintyError::InsufficientSamples {
            context: format!("empirical quantile {q}"),
            needed: 1,
            found: 0,
        });
    }
    Ok(quantile_sorted(&sorted(data), q))
}

/// Standard normal quantile `z(q)`, for `q` strictly inside (0, 1).
pub fn normal_quantile(q: f64) -> Result<f64> {
    if !(q > 0.0 && q < 1.0) {
        return Err(UncertaintyError::Numerical(format!(
            "normal quantile undefined at {q}"
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| UncertaintyError::Numerical(e.to_string()))?;
    Ok(normal.inverse_cdf(q))
}

/// Drops non-finite values, returning the kept values and their row indices.
pub fn finite_with_rows(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (v, i))
        .unzip()
}
