//! Linear quantile regression by iteratively reweighted least squares.
//!
//! Minimises the check loss `sum(rho_tau(y - X b))` where
//! `rho_tau(r) = r * (tau - 1{r < 0})`. Each iteration solves a weighted
//! least squares problem with weights `|tau - 1{r < 0}| / max(|r|, eps)`,
//! which makes the squared loss match the check loss at the current
//! residuals.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use uncertainty_core::{Result, UncertaintyError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrlsOptions {
    pub max_iter: usize,
    /// Relative tolerance on the largest coefficient change.
    pub tol: f64,
    /// Ridge penalty added to the normal equations.
    pub ridge: f64,
}

impl Default for IrlsOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-6,
            ridge: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileFit {
    pub tau: f64,
    pub coefficients: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl QuantileFit {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.coefficients.iter().zip(row).map(|(b, x)| b * x).sum()
    }
}

/// Solves `(X' W X + ridge I) b = X' W y`.
pub fn weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    weights: &DVector<f64>,
    ridge: f64,
) -> Result<DVector<f64>> {
    let mut xw = x.clone();
    for (i, mut row) in xw.row_iter_mut().enumerate() {
        row *= weights[i];
    }
    let p = x.ncols();
    let a = x.transpose() * &xw + DMatrix::<f64>::identity(p, p) * ridge;
    let b = xw.transpose() * y;

    let solution = match a.clone().cholesky() {
        Some(chol) => Some(chol.solve(&b)),
        None => a.lu().solve(&b),
    };
    solution
        .filter(|s| s.iter().all(|v| v.is_finite()))
        .ok_or_else(|| UncertaintyError::Numerical("singular design matrix".to_string()))
}

/// Fits one quantile `tau` in (0, 1).
pub fn fit_quantile(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    tau: f64,
    options: &IrlsOptions,
) -> Result<QuantileFit> {
    let n = x.nrows();
    let scale = y.iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let eps = 1e-6 * scale.max(1.0);

    let mut beta = weighted_least_squares(x, y, &DVector::from_element(n, 1.0), options.ridge)?;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 1..=options.max_iter {
        iterations = iter;
        let residuals = y - x * &beta;
        let weights = residuals.map(|r| {
            let side = if r < 0.0 { 1.0 - tau } else { tau };
            side / r.abs().max(eps)
        });
        let next = weighted_least_squares(x, y, &weights, options.ridge)?;
        let change = (&next - &beta).amax();
        let size = next.amax();
        beta = next;
        if change <= options.tol * (1.0 + size) {
            converged = true;
            break;
        }
    }

    Ok(QuantileFit {
        tau,
        coefficients: beta.iter().copied().collect(),
        iterations,
        converged,
    })
}
