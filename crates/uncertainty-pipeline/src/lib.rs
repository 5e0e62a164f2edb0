//! Uncertainty Pipeline
//!
//! Glue between the forecasting pipeline and the uncertainty strategies:
//! the method registry, the adapter that attaches intervals to a forecast,
//! environment configuration and per-fold interval evaluation.

pub mod adapter;
pub mod config;
pub mod folds;
pub mod registry;

#[cfg(test)]
mod tests;

pub use adapter::{ForecastOutput, UncertaintyAdapter};
pub use config::PipelineConfig;
pub use folds::{evaluate_folds, evaluate_folds_with, summarize, winkler_score, EvaluationSummary, Fold, FoldReport};
pub use registry::{build_model, lookup, RegistryEntry, REGISTRY};
