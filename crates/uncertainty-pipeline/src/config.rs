use anyhow::{Context, Result};
use serde::Serialize;
use uncertainty_core::UncertaintyConfig;

/// Pipeline-level uncertainty settings loaded from the environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// `None` when no uncertainty was requested.
    pub uncertainty: Option<UncertaintyConfig>,
    pub fail_on_error: bool,
    pub parallel_folds: bool,
    /// 0 disables the check.
    pub min_train_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            uncertainty: None,
            fail_on_error: false,
            parallel_folds: true,
            min_train_rows: 0,
        }
    }
}

impl PipelineConfig {
    /// Loads `.env` if present, then reads the `UNCERTAINTY_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let uncertainty = match read("UNCERTAINTY_CONFIG") {
            Some(json) => UncertaintyConfig::from_json(&json).context("Invalid UNCERTAINTY_CONFIG")?,
            None => None,
        };

        let config = Self {
            uncertainty,
            fail_on_error: match read("UNCERTAINTY_FAIL_ON_ERROR") {
                Some(v) => v.parse().context("UNCERTAINTY_FAIL_ON_ERROR must be true or false")?,
                None => defaults.fail_on_error,
            },
            parallel_folds: match read("UNCERTAINTY_PARALLEL_FOLDS") {
                Some(v) => v.parse().context("UNCERTAINTY_PARALLEL_FOLDS must be true or false")?,
                None => defaults.parallel_folds,
            },
            min_train_rows: match read("UNCERTAINTY_MIN_TRAIN_ROWS") {
                Some(v) => v
                    .parse()
                    .context("UNCERTAINTY_MIN_TRAIN_ROWS must be a non-negative integer")?,
                None => defaults.min_train_rows,
            },
        };

        match &config.uncertainty {
            Some(u) => tracing::info!("Uncertainty method: {}", u.method),
            None => tracing::info!("Uncertainty intervals disabled"),
        }
        Ok(config)
    }
}
