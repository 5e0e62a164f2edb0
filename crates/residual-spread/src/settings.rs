use serde::{Deserialize, Serialize};
use uncertainty_core::columns::TIME_COL;
use uncertainty_core::features::numeric_feature;
use uncertainty_core::{CommonParams, DataFrame, Params, Result, UncertaintyError, UncertaintyMethod};

/// Quantity regressed on the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadTarget {
    /// `|r|`; for normal residuals `E|r| = sigma * sqrt(2 / pi)`
    Absolute,
    /// `r^2`; `E[r^2] = sigma^2` for zero-mean residuals
    Squared,
}

impl SpreadTarget {
    fn parse(raw: Option<String>) -> Result<Self> {
        match raw.as_deref() {
            None | Some("absolute") => Ok(SpreadTarget::Absolute),
            Some("squared") => Ok(SpreadTarget::Squared),
            Some(other) => Err(UncertaintyError::invalid_param(
                "spread_target",
                format!("expected 'absolute' or 'squared', got '{other}'"),
            )),
        }
    }

    pub fn transform(&self, residual: f64) -> f64 {
        match self {
            SpreadTarget::Absolute => residual.abs(),
            SpreadTarget::Squared => residual * residual,
        }
    }

    /// Maps a fitted target value back to a normal standard deviation.
    pub fn to_sigma(&self, fitted: f64) -> f64 {
        match self {
            SpreadTarget::Absolute => fitted * std::f64::consts::FRAC_PI_2.sqrt(),
            SpreadTarget::Squared => fitted.max(0.0).sqrt(),
        }
    }
}

/// Location of the interval relative to the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Center {
    /// Shift by the mean training residual
    Mean,
    /// Centre on the forecast
    Zero,
}

impl Center {
    fn parse(raw: Option<String>) -> Result<Self> {
        match raw.as_deref() {
            None | Some("mean") => Ok(Center::Mean),
            Some("zero") => Ok(Center::Zero),
            Some(other) => Err(UncertaintyError::invalid_param(
                "center",
                format!("expected 'mean' or 'zero', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResidualSpreadSettings {
    pub common: CommonParams,
    pub feature_cols: Vec<String>,
    pub spread_target: SpreadTarget,
    pub center: Center,
    pub ridge: f64,
    /// Floor on the fitted sigma, as a fraction of the overall residual std.
    pub min_spread_ratio: f64,
    pub time_col: String,
}

impl ResidualSpreadSettings {
    pub const KEYS: &'static [&'static str] = &[
        "feature_cols",
        "spread_target",
        "center",
        "ridge",
        "min_spread_ratio",
        "time_col",
    ];

    pub const DEFAULT_RIDGE: f64 = 1e-8;
    pub const DEFAULT_MIN_SPREAD_RATIO: f64 = 1e-3;

    pub fn parse(params: &Params) -> Result<Self> {
        params.warn_unknown(UncertaintyMethod::ResidualSpreadRegression, Self::KEYS);

        let common = CommonParams::parse(params)?;
        common.require_open_quantiles()?;

        let ridge = params.number("ridge")?.unwrap_or(Self::DEFAULT_RIDGE);
        if ridge < 0.0 {
            return Err(UncertaintyError::invalid_param("ridge", format!("must be >= 0, got {ridge}")));
        }
        let min_spread_ratio = params
            .number("min_spread_ratio")?
            .unwrap_or(Self::DEFAULT_MIN_SPREAD_RATIO);
        if !(min_spread_ratio > 0.0 && min_spread_ratio < 1.0) {
            return Err(UncertaintyError::invalid_param(
                "min_spread_ratio",
                format!("must be in (0, 1), got {min_spread_ratio}"),
            ));
        }

        Ok(Self {
            common,
            feature_cols: params.text_list("feature_cols")?.unwrap_or_default(),
            spread_target: SpreadTarget::parse(params.text("spread_target")?)?,
            center: Center::parse(params.text("center")?)?,
            ridge,
            min_spread_ratio,
            time_col: params.text("time_col")?.unwrap_or_else(|| TIME_COL.to_string()),
        })
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
