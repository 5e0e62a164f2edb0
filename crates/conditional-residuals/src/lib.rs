//! Conditional Residuals
//!
//! The `simple_conditional_residuals` uncertainty strategy: prediction
//! intervals from the quantiles of historical forecast residuals, optionally
//! bucketed by grouping columns such as day of week or horizon step.

pub mod residuals;
pub mod settings;

pub use residuals::{
    ConditionalResiduals, ConditionalResidualsModel, ConditionalResidualsState, ResidualDistribution,
};
pub use settings::{ConditionalResidualsSettings, QuantileEstimation, SmallSampleMethod};
