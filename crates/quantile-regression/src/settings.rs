use uncertainty_core::columns::TIME_COL;
use uncertainty_core::features::numeric_feature;
use uncertainty_core::{CommonParams, DataFrame, Params, Result, UncertaintyError, UncertaintyMethod};

use crate::irls::IrlsOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileRegressionSettings {
    pub common: CommonParams,
    pub feature_cols: Vec<String>,
    /// Regress residuals instead of actual values.
    pub is_residual_based: bool,
    pub irls: IrlsOptions,
    pub time_col: String,
}

impl QuantileRegressionSettings {
    pub const KEYS: &'static [&'static str] = &[
        "feature_cols",
        "is_residual_based",
        "max_iter",
        "tol",
        "ridge",
        "time_col",
    ];

    pub fn parse(params: &Params) -> Result<Self> {
        params.warn_unknown(UncertaintyMethod::QuantileRegression, Self::KEYS);

        let common = CommonParams::parse(params)?;
        common.require_open_quantiles()?;

        let defaults = IrlsOptions::default();
        let max_iter = params.count("max_iter")?.unwrap_or(defaults.max_iter);
        if max_iter == 0 {
            return Err(UncertaintyError::invalid_param("max_iter", "must be at least 1"));
        }
        let tol = params.number("tol")?.unwrap_or(defaults.tol);
        if tol <= 0.0 {
            return Err(UncertaintyError::invalid_param("tol", format!("must be positive, got {tol}")));
        }
        let ridge = params.number("ridge")?.unwrap_or(defaults.ridge);
        if ridge < 0.0 {
            return Err(UncertaintyError::invalid_param("ridge", format!("must be >= 0, got {ridge}")));
        }

        Ok(Self {
            common,
            feature_cols: params.text_list("feature_cols")?.unwrap_or_default(),
            is_residual_based: params.flag("is_residual_based")?.unwrap_or(false),
            irls: IrlsOptions { max_iter, tol, ridge },
            time_col: params.text("time_col")?.unwrap_or_else(|| TIME_COL.to_string()),
        })
    }

    /// Names of the design matrix columns, in order.
    pub fn regressor_names(&self) -> Vec<String> {
        let mut names = vec!["intercept".to_string()];
        if !self.is_residual_based {
            names.push(self.common.forecast_col.clone());
        }
        names.extend(self.feature_cols.iter().cloned());
        names
    }

    pub fn check_columns(&self, frame: &DataFrame, with_actuals: bool) -> Result<()> {
        if with_actuals {
            frame.floats(&self.common.value_col)?;
        }
        frame.floats(&self.common.forecast_col)?;
        for col in &self.feature_cols {
            numeric_feature(frame, col, &self.time_col)?;
        }
        Ok(())
    }
}
