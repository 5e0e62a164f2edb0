//! Uncertainty Core
//!
//! Shared contract for attaching prediction intervals to point forecasts:
//! columnar frames, the uncertainty configuration, the closed method
//! enumeration, the error taxonomy and the fit/predict lifecycle every
//! strategy runs through.

pub mod columns;
pub mod config;
pub mod error;
pub mod features;
pub mod frame;
pub mod method;
pub mod model;
pub mod stats;

#[cfg(test)]
mod tests;

pub use config::{CommonParams, Params, UncertaintyConfig, DEFAULT_COVERAGE};
pub use error::{ErrorKind, FrameError, FrameRole, Result, UncertaintyError};
pub use frame::{Column, DataFrame};
pub use method::UncertaintyMethod;
pub use model::{Estimator, IntervalBounds, PredictionFrame, UncertaintyModel, UncertaintyStrategy};
