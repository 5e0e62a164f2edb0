use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UncertaintyError;

/// Closed set of uncertainty strategies. The string tag is the key used in
/// configuration mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMethod {
    /// Residual quantiles, optionally conditioned on grouping columns
    SimpleConditionalResiduals,
    /// Linear quantile regression on the forecast and feature columns
    QuantileRegression,
    /// Regression of the residual spread on feature columns
    ResidualSpreadRegression,
    /// Split conformal intervals from residual nonconformity scores
    SplitConformal,
}

impl UncertaintyMethod {
    pub const ALL: [UncertaintyMethod; 4] = [
        UncertaintyMethod::SimpleConditionalResiduals,
        UncertaintyMethod::QuantileRegression,
        UncertaintyMethod::ResidualSpreadRegression,
        UncertaintyMethod::SplitConformal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UncertaintyMethod::SimpleConditionalResiduals => "simple_conditional_residuals",
            UncertaintyMethod::QuantileRegression => "quantile_regression",
            UncertaintyMethod::ResidualSpreadRegression => "residual_spread_regression",
            UncertaintyMethod::SplitConformal => "split_conformal",
        }
    }

    /// Comma separated list of every tag, for error messages.
    pub fn known_tags() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for UncertaintyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyMethod {
    type Err = UncertaintyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| UncertaintyError::UnknownMethod {
                method: s.to_string(),
                known: Self::known_tags(),
            })
    }
}
