//! Linear quantile regression intervals.
//!
//! One linear model per configured quantile. Value-based fits regress the
//! actual value on an intercept, the forecast and any feature columns.
//! Residual-based fits regress `actual - forecast` on an intercept and the
//! features, then add the forecast back at prediction time.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use uncertainty_core::features::numeric_feature;
use uncertainty_core::{
    CommonParams, DataFrame, Estimator, IntervalBounds, Params, Result, UncertaintyError,
    UncertaintyMethod, UncertaintyStrategy,
};

use crate::irls::{fit_quantile, QuantileFit};
use crate::settings::QuantileRegressionSettings;

/// Fitted coefficients, one [`QuantileFit`] per quantile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileRegressionState {
    pub regressors: Vec<String>,
    pub fits: Vec<QuantileFit>,
    pub rows_used: usize,
}

/// The `quantile_regression` strategy.
#[derive(Debug, Clone, Copy)]
pub struct QuantileRegression;

pub type QuantileRegressionModel = Estimator<QuantileRegression>;

impl QuantileRegression {
    /// Row-major design matrix values for `frame`, including the intercept.
    fn design_rows(settings: &QuantileRegressionSettings, frame: &DataFrame) -> Result<Vec<Vec<f64>>> {
        let forecast = frame.floats(&settings.common.forecast_col)?;
        let features = settings
            .feature_cols
            .iter()
            .map(|name| numeric_feature(frame, name, &settings.time_col))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((0..frame.height())
            .map(|row| {
                let mut values = Vec::with_capacity(2 + features.len());
                values.push(1.0);
                if !settings.is_residual_based {
                    values.push(forecast[row]);
                }
                values.extend(features.iter().map(|f| f[row]));
                values
            })
            .collect())
    }
}

impl UncertaintyStrategy for QuantileRegression {
    const METHOD: UncertaintyMethod = UncertaintyMethod::QuantileRegression;
    type Settings = QuantileRegressionSettings;
    type State = QuantileRegressionState;

    fn validate(params: &Params, train: &DataFrame) -> Result<Self::Settings> {
        let settings = QuantileRegressionSettings::parse(params)?;
        settings.check_columns(train, true)?;
        Ok(settings)
    }

    fn common(settings: &Self::Settings) -> &CommonParams {
        &settings.common
    }

    fn fit(settings: &Self::Settings, train: &DataFrame) -> Result<Self::State> {
        let actual = train.floats(&settings.common.value_col)?;
        let forecast = train.floats(&settings.common.forecast_col)?;
        let design = Self::design_rows(settings, train)?;

        let mut rows = Vec::new();
        let mut target = Vec::new();
        for (i, values) in design.into_iter().enumerate() {
            let y = if settings.is_residual_based {
                actual[i] - forecast[i]
            } else {
                actual[i]
            };
            if y.is_finite() && values.iter().all(|v| v.is_finite()) {
                rows.push(values);
                target.push(y);
            }
        }

        let regressors = settings.regressor_names();
        let p = regressors.len();
        if rows.len() <= p {
            return Err(UncertaintyError::InsufficientSamples {
                context: format!("quantile regression on {p} regressors"),
                needed: p + 1,
                found: rows.len(),
            });
        }
        if rows.len() < train.height() {
            tracing::debug!(
                "Dropped {} training rows with missing values",
                train.height() - rows.len()
            );
        }

        let n = rows.len();
        let x = DMatrix::from_fn(n, p, |i, j| rows[i][j]);
        let y = DVector::from_vec(target);

        let mut fits = Vec::with_capacity(settings.common.quantiles.len());
        for &tau in &settings.common.quantiles {
            let fit = fit_quantile(&x, &y, tau, &settings.irls)?;
            if !fit.converged {
                tracing::warn!(
                    "Quantile regression for q={} did not converge in {} iterations; using last estimate",
                    tau,
                    fit.iterations
                );
            }
            fits.push(fit);
        }

        Ok(QuantileRegressionState {
            regressors,
            fits,
            rows_used: n,
        })
    }

    fn predict(settings: &Self::Settings, state: &Self::State, future: &DataFrame) -> Result<IntervalBounds> {
        settings.check_columns(future, false)?;
        let forecast = future.floats(&settings.common.forecast_col)?;
        let design = Self::design_rows(settings, future)?;

        let k = state.fits.len();
        let mut quantiles = vec![Vec::with_capacity(design.len()); k];
        for (row, values) in design.iter().enumerate() {
            let offset = if settings.is_residual_based { forecast[row] } else { 0.0 };
            let mut point: Vec<f64> = state
                .fits
                .iter()
                .map(|fit| offset + fit.predict_row(values))
                .collect();
            // separately fitted lines may cross; reorder so bounds stay monotone
            point.sort_by(f64::total_cmp);
            for (column, value) in quantiles.iter_mut().zip(point) {
                column.push(value);
            }
        }

        Ok(IntervalBounds {
            quantiles,
            auxiliary: Vec::new(),
        })
    }
}
