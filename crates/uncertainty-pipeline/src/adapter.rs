//! Attaches prediction intervals to a point forecast.
//!
//! Interval estimation is an optional add-on to forecasting: when it fails
//! with a recoverable error the adapter logs the failure and returns the
//! point forecast without intervals. `fail_on_error` turns that fallback off.
//! Usage errors always propagate.

use serde::{Deserialize, Serialize};
use uncertainty_core::{
    DataFrame, Result, UncertaintyConfig, UncertaintyError, UncertaintyMethod,
};

use crate::config::PipelineConfig;
use crate::registry::build_model;

/// The future frame, with interval columns when they could be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub frame: DataFrame,
    pub method: Option<UncertaintyMethod>,
    pub coverage: Option<f64>,
    /// Columns added by the uncertainty model.
    pub interval_columns: Vec<String>,
    /// Why intervals are missing, when a configured model failed.
    pub fallback_reason: Option<String>,
}

impl ForecastOutput {
    fn point_only(frame: DataFrame, fallback_reason: Option<String>) -> Self {
        Self {
            frame,
            method: None,
            coverage: None,
            interval_columns: Vec::new(),
            fallback_reason,
        }
    }

    pub fn has_intervals(&self) -> bool {
        !self.interval_columns.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UncertaintyAdapter {
    config: Option<UncertaintyConfig>,
    fail_on_error: bool,
    min_train_rows: usize,
}

impl UncertaintyAdapter {
    pub fn new(config: Option<UncertaintyConfig>) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn from_pipeline_config(config: &PipelineConfig) -> Self {
        Self {
            config: config.uncertainty.clone(),
            fail_on_error: config.fail_on_error,
            min_train_rows: config.min_train_rows,
        }
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn min_train_rows(mut self, rows: usize) -> Self {
        self.min_train_rows = rows;
        self
    }

    pub fn config(&self) -> Option<&UncertaintyConfig> {
        self.config.as_ref()
    }

    /// Fits the configured model on `train` and adds interval columns to `future`.
    pub fn attach_intervals(&self, train: DataFrame, future: DataFrame) -> Result<ForecastOutput> {
        let Some(config) = &self.config else {
            return Ok(ForecastOutput::point_only(future, None));
        };

        match self.run(config, train, &future) {
            Ok(output) => Ok(output),
            Err(err) if err.is_recoverable() && !self.fail_on_error => {
                tracing::warn!(
                    "{} uncertainty failed ({:?}): {}; returning point forecast without intervals",
                    config.method,
                    err.kind(),
                    err
                );
                Ok(ForecastOutput::point_only(future, Some(err.to_string())))
            }
            Err(err) => Err(err),
        }
    }

    fn run(&self, config: &UncertaintyConfig, train: DataFrame, future: &DataFrame) -> Result<ForecastOutput> {
        if train.height() < self.min_train_rows {
            return Err(UncertaintyError::InsufficientSamples {
                context: "uncertainty training rows".to_string(),
                needed: self.min_train_rows,
                found: train.height(),
            });
        }

        let mut model = build_model(config.clone())?;
        model.fit(train)?;
        let prediction = model.predict(future)?.clone();
        let interval_columns = prediction.interval_columns();
        Ok(ForecastOutput {
            method: Some(prediction.method),
            coverage: Some(prediction.coverage),
            interval_columns,
            fallback_reason: None,
            frame: prediction.into_frame(),
        })
    }
}
