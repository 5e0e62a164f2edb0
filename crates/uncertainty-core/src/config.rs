//! Uncertainty configuration: the method tag plus an open, typed params mapping.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::columns::{FORECAST_COL, VALUE_COL};
use crate::error::{Result, UncertaintyError};
use crate::method::UncertaintyMethod;

/// Coverage used when neither `coverage` nor `quantiles` is configured.
pub const DEFAULT_COVERAGE: f64 = 0.95;

const QUANTILE_TOLERANCE: f64 = 1e-6;

/// Immutable uncertainty configuration handed over by the forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUncertaintyConfig")]
pub struct UncertaintyConfig {
    pub method: UncertaintyMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

/// Wire shape before the method tag is resolved.
#[derive(Debug, Deserialize)]
struct RawUncertaintyConfig {
    #[serde(alias = "uncertainty_method")]
    method: String,
    #[serde(default)]
    params: Option<Params>,
}

impl TryFrom<RawUncertaintyConfig> for UncertaintyConfig {
    type Error = UncertaintyError;

    fn try_from(raw: RawUncertaintyConfig) -> Result<Self> {
        Ok(Self {
            method: raw.method.parse()?,
            params: raw.params,
        })
    }
}

impl UncertaintyConfig {
    pub fn new(method: UncertaintyMethod) -> Self {
        Self {
            method,
            params: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Parses a configuration mapping. `null` means no uncertainty was requested.
    ///
    /// An unknown method tag is reported as `UnknownMethod`; any other shape
    /// problem as `InvalidConfig`.
    pub fn from_value(value: Value) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        let raw: RawUncertaintyConfig = serde_json::from_value(value)
            .map_err(|e| UncertaintyError::InvalidConfig(e.to_string()))?;
        Self::try_from(raw).map(Some)
    }

    pub fn from_json(json: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| UncertaintyError::InvalidConfig(e.to_string()))?;
        Self::from_value(value)
    }

    /// Params with an absent mapping treated as empty.
    pub fn effective_params(&self) -> Cow<'_, Params> {
        Params::or_empty(self.params.as_ref())
    }
}

/// Strategy-specific parameters. Keys are validated by the strategy that reads
/// them; the getters here only enforce value types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared default for every strategy: no params means an empty mapping.
    pub fn or_empty(params: Option<&Params>) -> Cow<'_, Params> {
        match params {
            Some(p) => Cow::Borrowed(p),
            None => Cow::Owned(Params::new()),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Present and not `null`.
    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>> {
        match self.value(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|x| x.is_finite())
                .map(Some)
                .ok_or_else(|| UncertaintyError::invalid_param(key, format!("expected a number, got {v}"))),
        }
    }

    pub fn count(&self, key: &str) -> Result<Option<usize>> {
        match self.value(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    UncertaintyError::invalid_param(key, format!("expected a non-negative integer, got {v}"))
                }),
        }
    }

    pub fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.value(key) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| UncertaintyError::invalid_param(key, format!("expected a boolean, got {v}"))),
        }
    }

    pub fn text(&self, key: &str) -> Result<Option<String>> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
            Some(v) => Err(UncertaintyError::invalid_param(
                key,
                format!("expected a non-empty string, got {v}"),
            )),
        }
    }

    /// Accepts a single string or a list of strings.
    pub fn text_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        UncertaintyError::invalid_param(key, format!("expected strings, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(v) => Err(UncertaintyError::invalid_param(
                key,
                format!("expected a list of strings, got {v}"),
            )),
        }
    }

    pub fn number_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_f64().filter(|x| x.is_finite()).ok_or_else(|| {
                        UncertaintyError::invalid_param(key, format!("expected numbers, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(v) => Err(UncertaintyError::invalid_param(
                key,
                format!("expected a list of numbers, got {v}"),
            )),
        }
    }

    /// Keys not in `known`, logged once per fit. Unknown keys are never an error.
    pub fn warn_unknown(&self, method: UncertaintyMethod, known: &[&str]) -> Vec<String> {
        let unknown: Vec<String> = self
            .keys()
            .filter(|k| !known.contains(k) && !CommonParams::KEYS.contains(k))
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(
                "Ignoring unrecognized params for {}: {}",
                method,
                unknown.join(", ")
            );
        }
        unknown
    }
}

/// Params understood by every strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonParams {
    pub coverage: f64,
    /// Strictly increasing; the first and last entries are the interval bounds.
    pub quantiles: Vec<f64>,
    pub value_col: String,
    pub forecast_col: String,
}

impl CommonParams {
    pub const KEYS: &'static [&'static str] =
        &["coverage", "quantiles", "value_col", "forecast_col", "offset_col"];

    pub fn parse(params: &Params) -> Result<Self> {
        let coverage = params.number("coverage")?;
        if let Some(c) = coverage {
            if !(c > 0.0 && c <= 1.0) {
                return Err(UncertaintyError::invalid_param(
                    "coverage",
                    format!("must be in (0, 1], got {c}"),
                ));
            }
        }

        let quantiles = match params.number_list("quantiles")? {
            Some(q) => {
                validate_quantiles(&q)?;
                if let Some(c) = coverage {
                    let implied = q[q.len() - 1] - q[0];
                    if (implied - c).abs() > QUANTILE_TOLERANCE {
                        return Err(UncertaintyError::invalid_param(
                            "quantiles",
                            format!("span {implied} does not match coverage {c}"),
                        ));
                    }
                }
                q
            }
            None => symmetric_quantiles(coverage.unwrap_or(DEFAULT_COVERAGE)),
        };
        let coverage = coverage.unwrap_or(quantiles[quantiles.len() - 1] - quantiles[0]);

        let forecast_col = match params.text("forecast_col")? {
            Some(col) => col,
            None => params
                .text("offset_col")?
                .unwrap_or_else(|| FORECAST_COL.to_string()),
        };

        Ok(Self {
            coverage,
            quantiles,
            value_col: params
                .text("value_col")?
                .unwrap_or_else(|| VALUE_COL.to_string()),
            forecast_col,
        })
    }

    pub fn lower_quantile(&self) -> f64 {
        self.quantiles[0]
    }

    pub fn upper_quantile(&self) -> f64 {
        self.quantiles[self.quantiles.len() - 1]
    }

    /// Parametric strategies cannot represent the 0 or 1 quantile.
    pub fn require_open_quantiles(&self) -> Result<()> {
        match self.quantiles.iter().find(|&&q| q <= 0.0 || q >= 1.0) {
            Some(q) => Err(UncertaintyError::invalid_param(
                "quantiles",
                format!("quantile {q} must lie strictly inside (0, 1) for this method"),
            )),
            None => Ok(()),
        }
    }
}

/// `[(1 - c) / 2, (1 + c) / 2]`.
pub fn symmetric_quantiles(coverage: f64) -> Vec<f64> {
    vec![(1.0 - coverage) / 2.0, (1.0 + coverage) / 2.0]
}

fn validate_quantiles(quantiles: &[f64]) -> Result<()> {
    if quantiles.len() < 2 {
        return Err(UncertaintyError::invalid_param(
            "quantiles",
            "at least two quantiles are required",
        ));
    }
    if let Some(q) = quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
        return Err(UncertaintyError::invalid_param(
            "quantiles",
            format!("{q} is outside [0, 1]"),
        ));
    }
    if quantiles.windows(2).any(|w| w[1] <= w[0]) {
        return Err(UncertaintyError::invalid_param(
            "quantiles",
            "must be strictly increasing",
        ));
    }
    Ok(())
}
