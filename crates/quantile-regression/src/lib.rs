//! Quantile Regression
//!
//! The `quantile_regression` uncertainty strategy: linear quantile models
//! fitted by iteratively reweighted least squares.

pub mod irls;
pub mod regression;
pub mod settings;

pub use irls::{fit_quantile, IrlsOptions, QuantileFit};
pub use regression::{QuantileRegression, QuantileRegressionModel, QuantileRegressionState};
pub use settings::QuantileRegressionSettings;
