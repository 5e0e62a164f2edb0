//! The uncertainty model contract and the shared fit/predict lifecycle.
//!
//! Strategies implement [`UncertaintyStrategy`]: a validation step that turns
//! the open params mapping into a closed settings struct, a fit step that
//! produces private fitted state, and a predict step that evaluates bounds.
//! [`Estimator`] wraps a strategy and owns the lifecycle, so every method
//! behaves the same way with respect to validation timing, refits and
//! predict-before-fit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::columns::{quantile_column, LOWER_COL, UPPER_COL};
use crate::config::{CommonParams, Params, UncertaintyConfig};
use crate::error::{FrameRole, Result, UncertaintyError};
use crate::frame::DataFrame;
use crate::method::UncertaintyMethod;

/// Object-safe interface the forecasting pipeline drives.
pub trait UncertaintyModel: Send + fmt::Debug {
    fn method(&self) -> UncertaintyMethod;

    /// The configuration exactly as it was supplied at construction.
    fn config(&self) -> &UncertaintyConfig;

    /// Validates the configuration against `train` and fits the strategy.
    ///
    /// On error the model is left unfitted, even if an earlier fit succeeded.
    fn fit(&mut self, train: DataFrame) -> Result<()>;

    /// Computes interval columns for `future` and stores the result as the
    /// latest prediction.
    fn predict(&mut self, future: &DataFrame) -> Result<&PredictionFrame>;

    /// Latest prediction, if any.
    fn prediction(&self) -> Option<&PredictionFrame>;

    /// Training frame of the current fit.
    fn train_frame(&self) -> Option<&DataFrame>;

    fn is_fitted(&self) -> bool;
}

/// A statistical method plugged into [`Estimator`].
pub trait UncertaintyStrategy: fmt::Debug + Send + Sync + 'static {
    const METHOD: UncertaintyMethod;

    /// Closed, validated form of the params.
    type Settings: fmt::Debug + Clone + Send;
    /// Parameters learned from the training frame.
    type State: fmt::Debug + Clone + Send;

    /// Parses `params` and checks that `train` has every column they require.
    /// Must fail only with `UncertaintyError`.
    fn validate(params: &Params, train: &DataFrame) -> Result<Self::Settings>;

    fn common(settings: &Self::Settings) -> &CommonParams;

    fn fit(settings: &Self::Settings, train: &DataFrame) -> Result<Self::State>;

    fn predict(
        settings: &Self::Settings,
        state: &Self::State,
        future: &DataFrame,
    ) -> Result<IntervalBounds>;
}

/// Per-row values returned by a strategy's predict step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalBounds {
    /// One vector per configured quantile, in quantile order.
    pub quantiles: Vec<Vec<f64>>,
    /// Extra named columns, e.g. the residual spread.
    pub auxiliary: Vec<(&'static str, Vec<f64>)>,
}

/// The future frame augmented with interval columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFrame {
    pub method: UncertaintyMethod,
    pub coverage: f64,
    pub quantiles: Vec<f64>,
    pub lower_col: String,
    pub upper_col: String,
    pub frame: DataFrame,
}

impl PredictionFrame {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn lower(&self) -> &[f64] {
        self.frame.floats(&self.lower_col).unwrap_or(&[])
    }

    pub fn upper(&self) -> &[f64] {
        self.frame.floats(&self.upper_col).unwrap_or(&[])
    }

    /// Names of every column this prediction added to the future frame.
    pub fn interval_columns(&self) -> Vec<String> {
        let mut cols = vec![self.lower_col.clone(), self.upper_col.clone()];
        if self.quantiles.len() > 2 {
            cols.extend(self.quantiles.iter().map(|&q| quantile_column(q)));
        }
        cols
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}

#[derive(Debug, Clone)]
struct Fitted<S: UncertaintyStrategy> {
    settings: S::Settings,
    state: S::State,
}

/// Lifecycle wrapper shared by every strategy.
#[derive(Debug, Clone)]
pub struct Estimator<S: UncertaintyStrategy> {
    config: UncertaintyConfig,
    train: Option<DataFrame>,
    fitted: Option<Fitted<S>>,
    prediction: Option<PredictionFrame>,
}

impl<S: UncertaintyStrategy> Estimator<S> {
    /// Stores the configuration; nothing is validated until `fit`.
    pub fn new(config: UncertaintyConfig) -> Self {
        Self {
            config,
            train: None,
            fitted: None,
            prediction: None,
        }
    }

    /// Fitted settings, for inspection.
    pub fn settings(&self) -> Option<&S::Settings> {
        self.fitted.as_ref().map(|f| &f.settings)
    }

    /// Fitted state, for inspection.
    pub fn state(&self) -> Option<&S::State> {
        self.fitted.as_ref().map(|f| &f.state)
    }

    fn try_fit(&self, train: &DataFrame) -> Result<Fitted<S>> {
        if self.config.method != S::METHOD {
            return Err(UncertaintyError::InvalidConfig(format!(
                "configuration is for {} but the model implements {}",
                self.config.method,
                S::METHOD
            )));
        }
        if train.is_empty() {
            return Err(UncertaintyError::EmptyFrame(FrameRole::Training));
        }
        let params = self.config.effective_params();
        let settings = S::validate(&params, train)?;
        let state = S::fit(&settings, train)?;
        Ok(Fitted { settings, state })
    }

    fn assemble(
        settings: &S::Settings,
        bounds: IntervalBounds,
        future: &DataFrame,
    ) -> Result<PredictionFrame> {
        let common = S::common(settings);
        let rows = future.height();
        if bounds.quantiles.len() != common.quantiles.len()
            || bounds.quantiles.iter().any(|q| q.len() != rows)
        {
            return Err(UncertaintyError::Numerical(format!(
                "{} returned bounds that do not match {} quantiles x {} rows",
                S::METHOD,
                common.quantiles.len(),
                rows
            )));
        }

        let mut frame = future.clone();
        let last = bounds.quantiles.len() - 1;
        frame.set_column(LOWER_COL, bounds.quantiles[0].clone())?;
        frame.set_column(UPPER_COL, bounds.quantiles[last].clone())?;
        if common.quantiles.len() > 2 {
            for (&q, values) in common.quantiles.iter().zip(bounds.quantiles) {
                frame.set_column(quantile_column(q), values)?;
            }
        }
        for (name, values) in bounds.auxiliary {
            frame.set_column(name, values)?;
        }

        Ok(PredictionFrame {
            method: S::METHOD,
            coverage: common.coverage,
            quantiles: common.quantiles.clone(),
            lower_col: LOWER_COL.to_string(),
            upper_col: UPPER_COL.to_string(),
            frame,
        })
    }
}

impl<S: UncertaintyStrategy> UncertaintyModel for Estimator<S> {
    fn method(&self) -> UncertaintyMethod {
        S::METHOD
    }

    fn config(&self) -> &UncertaintyConfig {
        &self.config
    }

    fn fit(&mut self, train: DataFrame) -> Result<()> {
        self.fitted = None;
        self.train = None;
        self.prediction = None;

        let fitted = self.try_fit(&train)?;
        tracing::debug!("Fitted {} on {} training rows", S::METHOD, train.height());
        self.fitted = Some(fitted);
        self.train = Some(train);
        Ok(())
    }

    fn predict(&mut self, future: &DataFrame) -> Result<&PredictionFrame> {
        let fitted = self.fitted.as_ref().ok_or(UncertaintyError::NotFitted)?;
        if future.is_empty() {
            return Err(UncertaintyError::EmptyFrame(FrameRole::Future));
        }
        let bounds = S::predict(&fitted.settings, &fitted.state, future)?;
        let prediction = Self::assemble(&fitted.settings, bounds, future)?;
        let stored = self.prediction.insert(prediction);
        Ok(&*stored)
    }

    fn prediction(&self) -> Option<&PredictionFrame> {
        self.prediction.as_ref()
    }

    fn train_frame(&self) -> Option<&DataFrame> {
        self.train.as_ref()
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}
