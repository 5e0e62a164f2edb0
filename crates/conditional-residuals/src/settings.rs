use serde::{Deserialize, Serialize};
use uncertainty_core::columns::TIME_COL;
use uncertainty_core::features::grouping_column;
use uncertainty_core::{CommonParams, DataFrame, Params, Result, UncertaintyError, UncertaintyMethod};

/// How quantile offsets are estimated from a residual sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileEstimation {
    /// Normal distribution with the sample mean and standard deviation
    NormalFit,
    /// Empirical quantiles with linear interpolation
    Ecdf,
}

impl QuantileEstimation {
    fn parse(raw: Option<String>) -> Result<Self> {
        match raw.as_deref() {
            None | Some("normal_fit") => Ok(QuantileEstimation::NormalFit),
            Some("ecdf") => Ok(QuantileEstimation::Ecdf),
            Some(other) => Err(UncertaintyError::invalid_param(
                "quantile_estimation_method",
                format!("expected 'normal_fit' or 'ecdf', got '{other}'"),
            )),
        }
    }
}

/// Treatment of groups with fewer than `sample_size_thresh` residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallSampleMethod {
    /// Normal fit with a high quantile of the per-group standard deviations
    StdQuantiles,
    /// Use the distribution of all residuals
    Unconditional,
}

impl SmallSampleMethod {
    fn parse(raw: Option<String>) -> Result<Self> {
        match raw.as_deref() {
            None | Some("std_quantiles") => Ok(SmallSampleMethod::StdQuantiles),
            Some("unconditional") => Ok(SmallSampleMethod::Unconditional),
            Some(other) => Err(UncertaintyError::invalid_param(
                "small_sample_size_method",
                format!("expected 'std_quantiles' or 'unconditional', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalResidualsSettings {
    pub common: CommonParams,
    pub conditional_cols: Vec<String>,
    pub estimation: QuantileEstimation,
    pub sample_size_thresh: usize,
    pub small_sample_method: SmallSampleMethod,
    pub small_sample_quantile: f64,
    pub time_col: String,
}

impl ConditionalResidualsSettings {
    pub const KEYS: &'static [&'static str] = &[
        "conditional_cols",
        "quantile_estimation_method",
        "sample_size_thresh",
        "small_sample_size_method",
        "small_sample_size_quantile",
        "time_col",
    ];

    pub const DEFAULT_SAMPLE_SIZE_THRESH: usize = 20;
    pub const DEFAULT_SMALL_SAMPLE_QUANTILE: f64 = 0.95;

    pub fn parse(params: &Params) -> Result<Self> {
        params.warn_unknown(UncertaintyMethod::SimpleConditionalResiduals, Self::KEYS);

        let common = CommonParams::parse(params)?;
        let estimation = QuantileEstimation::parse(params.text("quantile_estimation_method")?)?;
        if estimation == QuantileEstimation::NormalFit {
            common.require_open_quantiles()?;
        }

        let small_sample_quantile = params
            .number("small_sample_size_quantile")?
            .unwrap_or(Self::DEFAULT_SMALL_SAMPLE_QUANTILE);
        if !(small_sample_quantile > 0.0 && small_sample_quantile < 1.0) {
            return Err(UncertaintyError::invalid_param(
                "small_sample_size_quantile",
                format!("must be in (0, 1), got {small_sample_quantile}"),
            ));
        }

        Ok(Self {
            common,
            conditional_cols: params.text_list("conditional_cols")?.unwrap_or_default(),
            estimation,
            sample_size_thresh: params
                .count("sample_size_thresh")?
                .unwrap_or(Self::DEFAULT_SAMPLE_SIZE_THRESH),
            small_sample_method: SmallSampleMethod::parse(params.text("small_sample_size_method")?)?,
            small_sample_quantile,
            time_col: params.text("time_col")?.unwrap_or_else(|| TIME_COL.to_string()),
        })
    }

    /// Checks that every column the settings read exists in `frame`.
    pub fn check_columns(&self, frame: &DataFrame, with_actuals: bool) -> Result<()> {
        if with_actuals {
            frame.floats(&self.common.value_col)?;
        }
        frame.floats(&self.common.forecast_col)?;
        for col in &self.conditional_cols {
            grouping_column(frame, col, &self.time_col)?;
        }
        Ok(())
    }
}
