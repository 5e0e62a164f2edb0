//! Tag -> constructor table for every uncertainty strategy.

use conditional_residuals::ConditionalResiduals;
use conformal_intervals::SplitConformal;
use quantile_regression::QuantileRegression;
use residual_spread::ResidualSpread;
use uncertainty_core::{
    Estimator, Result, UncertaintyConfig, UncertaintyError, UncertaintyMethod, UncertaintyModel,
    UncertaintyStrategy,
};

pub type Constructor = fn(UncertaintyConfig) -> Box<dyn UncertaintyModel>;

#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub method: UncertaintyMethod,
    pub description: &'static str,
    pub construct: Constructor,
}

fn construct<S: UncertaintyStrategy>(config: UncertaintyConfig) -> Box<dyn UncertaintyModel> {
    Box::new(Estimator::<S>::new(config))
}

pub static REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        method: UncertaintyMethod::SimpleConditionalResiduals,
        description: "Quantiles of historical residuals, optionally grouped by conditioning columns",
        construct: construct::<ConditionalResiduals>,
    },
    RegistryEntry {
        method: UncertaintyMethod::QuantileRegression,
        description: "Linear quantile regression on the forecast and feature columns",
        construct: construct::<QuantileRegression>,
    },
    RegistryEntry {
        method: UncertaintyMethod::ResidualSpreadRegression,
        description: "Normal intervals scaled by a regression of residual spread",
        construct: construct::<ResidualSpread>,
    },
    RegistryEntry {
        method: UncertaintyMethod::SplitConformal,
        description: "Split conformal intervals from calibration residuals",
        construct: construct::<SplitConformal>,
    },
];

pub fn entry(method: UncertaintyMethod) -> Result<&'static RegistryEntry> {
    REGISTRY
        .iter()
        .find(|e| e.method == method)
        .ok_or_else(|| UncertaintyError::InvalidConfig(format!("no constructor registered for {method}")))
}

/// Resolves a method tag, failing with `UnknownMethod` for anything else.
pub fn lookup(tag: &str) -> Result<&'static RegistryEntry> {
    entry(tag.parse::<UncertaintyMethod>()?)
}

/// Builds an unfitted model for `config`. Params are not inspected here.
pub fn build_model(config: UncertaintyConfig) -> Result<Box<dyn UncertaintyModel>> {
    let entry = entry(config.method)?;
    tracing::debug!("Constructing {} uncertainty model", entry.method);
    Ok((entry.construct)(config))
}
