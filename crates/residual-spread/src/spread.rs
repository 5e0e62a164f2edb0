//! Heteroscedastic normal intervals from a regression of residual spread.
//!
//! The absolute (or squared) training residuals are regressed on an intercept
//! and the feature columns by ridge least squares. At prediction time the
//! fitted spread is converted to a normal standard deviation `sigma(x)` and
//! the bounds are `forecast + center + sigma(x) * z(q)`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use uncertainty_core::columns::ERR_STD_COL;
use uncertainty_core::features::numeric_feature;
use uncertainty_core::stats::{self, normal_quantile};
use uncertainty_core::{
    CommonParams, DataFrame, Estimator, IntervalBounds, Params, Result, UncertaintyError,
    UncertaintyMethod, UncertaintyStrategy,
};

use crate::settings::{Center, ResidualSpreadSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualSpreadState {
    /// Intercept first, then one coefficient per feature column.
    pub coefficients: Vec<f64>,
    pub center: f64,
    pub overall_std: f64,
    /// Smallest sigma ever emitted.
    pub sigma_floor: f64,
    pub rows_used: usize,
}

impl ResidualSpreadState {
    /// NaN when any feature is missing; the floor only applies to finite fits.
    fn sigma(&self, settings: &ResidualSpreadSettings, features: &[f64]) -> f64 {
        let fitted = self.coefficients[0]
            + self.coefficients[1..]
                .iter()
                .zip(features)
                .map(|(b, x)| b * x)
                .sum::<f64>();
        if !fitted.is_finite() {
            return f64::NAN;
        }
        settings.spread_target.to_sigma(fitted).max(self.sigma_floor)
    }
}

/// The `residual_spread_regression` strategy.
#[derive(Debug, Clone, Copy)]
pub struct ResidualSpread;

pub type ResidualSpreadModel = Estimator<ResidualSpread>;

/// Solves `(X'X + ridge I) b = X'y`.
fn ridge_least_squares(x: &DMatrix<f64>, y: &DVector<f64>, ridge: f64) -> Result<Vec<f64>> {
    let p = x.ncols();
    let a = x.transpose() * x + DMatrix::<f64>::identity(p, p) * ridge;
    let b = x.transpose() * y;
    let solution = match a.clone().cholesky() {
        Some(chol) => Some(chol.solve(&b)),
        None => a.lu().solve(&b),
    };
    solution
        .filter(|s| s.iter().all(|v| v.is_finite()))
        .map(|s| s.iter().copied().collect())
        .ok_or_else(|| UncertaintyError::Numerical("spread regression design is singular".to_string()))
}

fn feature_values<'a>(
    settings: &ResidualSpreadSettings,
    frame: &'a DataFrame,
) -> Result<Vec<std::borrow::Cow<'a, [f64]>>> {
    settings
        .feature_cols
        .iter()
        .map(|name| numeric_feature(frame, name, &settings.time_col).map_err(UncertaintyError::from))
        .collect()
}

impl UncertaintyStrategy for ResidualSpread {
    const METHOD: UncertaintyMethod = UncertaintyMethod::ResidualSpreadRegression;
    type Settings = ResidualSpreadSettings;
    type State = ResidualSpreadState;

    fn validate(params: &Params, train: &DataFrame) -> Result<Self::Settings> {
        let settings = ResidualSpreadSettings::parse(params)?;
        settings.check_columns(train, true)?;
        Ok(settings)
    }

    fn common(settings: &Self::Settings) -> &CommonParams {
        &settings.common
    }

    fn fit(settings: &Self::Settings, train: &DataFrame) -> Result<Self::State> {
        let actual = train.floats(&settings.common.value_col)?;
        let forecast = train.floats(&settings.common.forecast_col)?;
        let features = feature_values(settings, train)?;

        let mut residuals = Vec::with_capacity(actual.len());
        let mut rows = Vec::with_capacity(actual.len());
        for (i, (a, f)) in actual.iter().zip(forecast).enumerate() {
            let r = a - f;
            if r.is_finite() && features.iter().all(|col| col[i].is_finite()) {
                residuals.push(r);
                rows.push(i);
            }
        }

        let p = 1 + features.len();
        if residuals.len() <= p {
            return Err(UncertaintyError::InsufficientSamples {
                context: format!("spread regression on {p} regressors"),
                needed: p + 1,
                found: residuals.len(),
            });
        }

        let overall_std = stats::std_dev(&residuals);
        if !(overall_std > f64::EPSILON) {
            return Err(UncertaintyError::DegenerateVariance(format!(
                "residual standard deviation is {overall_std} over {} rows",
                residuals.len()
            )));
        }
        let center = match settings.center {
            Center::Mean => stats::mean(&residuals),
            Center::Zero => 0.0,
        };

        let n = residuals.len();
        let x = DMatrix::from_fn(n, p, |i, j| if j == 0 { 1.0 } else { features[j - 1][rows[i]] });
        let y = DVector::from_iterator(n, residuals.iter().map(|&r| settings.spread_target.transform(r - center)));
        let coefficients = ridge_least_squares(&x, &y, settings.ridge)?;

        tracing::debug!(
            "Spread regression on {} rows: overall std {:.4}, coefficients {:?}",
            n,
            overall_std,
            coefficients
        );

        Ok(ResidualSpreadState {
            coefficients,
            center,
            overall_std,
            sigma_floor: settings.min_spread_ratio * overall_std,
            rows_used: n,
        })
    }

    fn predict(settings: &Self::Settings, state: &Self::State, future: &DataFrame) -> Result<IntervalBounds> {
        settings.check_columns(future, false)?;
        let forecast = future.floats(&settings.common.forecast_col)?;
        let features = feature_values(settings, future)?;
        let z = settings
            .common
            .quantiles
            .iter()
            .map(|&q| normal_quantile(q))
            .collect::<Result<Vec<f64>>>()?;

        let mut row_features = vec![0.0; features.len()];
        let sigma: Vec<f64> = (0..future.height())
            .map(|row| {
                for (slot, col) in row_features.iter_mut().zip(&features) {
                    *slot = col[row];
                }
                state.sigma(settings, &row_features)
            })
            .collect();

        let quantiles = z
            .iter()
            .map(|zq| {
                forecast
                    .iter()
                    .zip(&sigma)
                    .map(|(f, s)| f + state.center + s * zq)
                    .collect()
            })
            .collect();

        Ok(IntervalBounds {
            quantiles,
            auxiliary: vec![(ERR_STD_COL, sigma)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::distributions::Distribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::Normal;
    use uncertainty_core::{Column, ErrorKind, UncertaintyConfig, UncertaintyModel};

    fn model(params: Params) -> ResidualSpreadModel {
        Estimator::new(UncertaintyConfig::new(UncertaintyMethod::ResidualSpreadRegression).with_params(params))
    }

    fn normal_frame(n: usize, sigma: f64, seed: u64) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, sigma).unwrap();
        let forecast: Vec<f64> = (0..n).map(|i| 10.0 + (i % 5) as f64).collect();
        let actual: Vec<f64> = forecast.iter().map(|f| f + noise.sample(&mut rng)).collect();
        DataFrame::from_columns(vec![("y", actual), ("forecast", forecast)]).unwrap()
    }

    fn load_frame(n: usize, seed: u64) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let load: Vec<f64> = (0..n).map(|i| 1.0 + (i % 10) as f64).collect();
        let actual: Vec<f64> = load.iter().map(|l| l * noise.sample(&mut rng)).collect();
        DataFrame::from_columns(vec![
            ("y", Column::from(actual)),
            ("forecast", Column::from(vec![0.0; n])),
            ("load", Column::from(load)),
        ])
        .unwrap()
    }

    #[test]
    fn test_constant_spread_matches_normal_width() {
        let sigma = 2.0;
        let expected = 2.0 * 1.959964 * sigma;
        let train = normal_frame(20_000, sigma, 21);
        let future = DataFrame::from_columns(vec![("forecast", vec![0.0])]).unwrap();

        for target in ["absolute", "squared"] {
            let mut m = model(Params::new().with("spread_target", target));
            m.fit(train.clone()).unwrap();
            let pred = m.predict(&future).unwrap();
            let width = pred.upper()[0] - pred.lower()[0];
            assert_relative_eq!(width, expected, max_relative = 0.03);
            let err_std = pred.frame.floats(ERR_STD_COL).unwrap();
            assert_relative_eq!(err_std[0], sigma, max_relative = 0.03);
        }
    }

    #[test]
    fn test_zero_center_brackets_forecast() {
        let mut m = model(Params::new().with("center", "zero").with("coverage", 0.5));
        m.fit(normal_frame(200, 1.0, 4)).unwrap();
        assert_eq!(m.state().unwrap().center, 0.0);
        let forecast = vec![-5.0, 0.0, 7.5];
        let pred = m
            .predict(&DataFrame::from_columns(vec![("forecast", forecast.clone())]).unwrap())
            .unwrap();
        for ((lo, hi), f) in pred.lower().iter().zip(pred.upper()).zip(&forecast) {
            assert!(lo <= f && f <= hi);
            assert_relative_eq!(f - lo, hi - f, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_spread_follows_feature() {
        let mut m = model(Params::new().with("feature_cols", vec!["load"]).with("center", "zero"));
        m.fit(load_frame(5000, 8)).unwrap();
        let future = DataFrame::from_columns(vec![
            ("forecast", Column::from(vec![0.0, 0.0])),
            ("load", Column::from(vec![1.0, 10.0])),
        ])
        .unwrap();
        let pred = m.predict(&future).unwrap();
        let sigma = pred.frame.floats(ERR_STD_COL).unwrap();
        assert!(sigma[1] > 5.0 * sigma[0], "sigma {sigma:?}");
        assert_relative_eq!(sigma[1], 10.0, max_relative = 0.1);
    }

    #[test]
    fn test_missing_feature_value_gives_nan_bounds() {
        let mut m = model(Params::new().with("feature_cols", vec!["load"]).with("center", "zero"));
        m.fit(load_frame(1000, 12)).unwrap();
        let future = DataFrame::from_columns(vec![
            ("forecast", Column::from(vec![0.0, 0.0])),
            ("load", Column::from(vec![5.0, f64::NAN])),
        ])
        .unwrap();
        let pred = m.predict(&future).unwrap();
        let sigma = pred.frame.floats(ERR_STD_COL).unwrap();
        assert!(sigma[0] > 1.0);
        assert!(sigma[1].is_nan());
        assert!(pred.lower()[1].is_nan());
        assert!(pred.upper()[1].is_nan());
        assert!(pred.upper()[0] > pred.lower()[0]);
    }

    #[test]
    fn test_sigma_is_floored() {
        let mut m = model(Params::new().with("feature_cols", "load").with("min_spread_ratio", 0.01));
        m.fit(load_frame(2000, 3)).unwrap();
        let state = m.state().unwrap().clone();
        assert_relative_eq!(state.sigma_floor, 0.01 * state.overall_std);

        // far below the training range the linear spread turns negative
        let future = DataFrame::from_columns(vec![
            ("forecast", Column::from(vec![0.0])),
            ("load", Column::from(vec![-100.0])),
        ])
        .unwrap();
        let pred = m.predict(&future).unwrap();
        assert_relative_eq!(pred.frame.floats(ERR_STD_COL).unwrap()[0], state.sigma_floor);
        assert!(pred.upper()[0] > pred.lower()[0]);
    }

    #[test]
    fn test_constant_residuals_are_degenerate() {
        let train = DataFrame::from_columns(vec![("y", vec![3.0, 4.0, 5.0]), ("forecast", vec![2.0, 3.0, 4.0])])
            .unwrap();
        let mut m = model(Params::new());
        let err = m.fit(train).unwrap_err();
        assert!(matches!(err, UncertaintyError::DegenerateVariance(_)));
        assert_eq!(err.kind(), ErrorKind::Fit);
    }

    #[test]
    fn test_full_coverage_rejected_at_fit() {
        let mut m = model(Params::new().with("coverage", 1.0));
        let err = m.fit(normal_frame(50, 1.0, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!m.is_fitted());
    }

    #[test]
    fn test_too_few_rows() {
        let train = DataFrame::from_columns(vec![
            ("y", Column::from(vec![1.0, 2.0])),
            ("forecast", Column::from(vec![0.0, 0.0])),
            ("load", Column::from(vec![1.0, f64::NAN])),
        ])
        .unwrap();
        let mut m = model(Params::new().with("feature_cols", "load"));
        let err = m.fit(train).unwrap_err();
        assert!(matches!(
            err,
            UncertaintyError::InsufficientSamples { needed: 3, found: 1, .. }
        ));
    }
}
