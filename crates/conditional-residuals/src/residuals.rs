//! Residual-quantile intervals, optionally conditioned on grouping columns.
//!
//! Residuals (actual - forecast) are bucketed by the rendered values of the
//! conditional columns. Each bucket with enough samples gets its own quantile
//! offsets; small buckets borrow a conservative spread; future rows whose
//! bucket never appeared in training use the distribution of all residuals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uncertainty_core::columns::ERR_STD_COL;
use uncertainty_core::features::group_keys;
use uncertainty_core::stats::{self, finite_with_rows, normal_quantile, quantile_sorted};
use uncertainty_core::{
    DataFrame, Estimator, IntervalBounds, Params, Result, UncertaintyError, UncertaintyMethod,
    UncertaintyStrategy,
};

use crate::settings::{ConditionalResidualsSettings, QuantileEstimation, SmallSampleMethod};

/// Minimum residuals needed to estimate a spread.
pub const MIN_RESIDUALS: usize = 2;

/// Quantile offsets of one residual sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualDistribution {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    /// Offset added to the forecast for each configured quantile.
    pub offsets: Vec<f64>,
}

impl ResidualDistribution {
    fn estimate(residuals: &[f64], quantiles: &[f64], estimation: QuantileEstimation) -> Result<Self> {
        let mean = stats::mean(residuals);
        let std = stats::std_dev(residuals);
        let offsets = match estimation {
            QuantileEstimation::NormalFit => Self::normal_offsets(mean, std, quantiles)?,
            QuantileEstimation::Ecdf => {
                let sorted = stats::sorted(residuals);
                quantiles.iter().map(|&q| quantile_sorted(&sorted, q)).collect()
            }
        };
        Ok(Self {
            count: residuals.len(),
            mean,
            std,
            offsets,
        })
    }

    fn normal_offsets(mean: f64, std: f64, quantiles: &[f64]) -> Result<Vec<f64>> {
        quantiles
            .iter()
            .map(|&q| normal_quantile(q).map(|z| mean + std * z))
            .collect()
    }
}

/// Fitted residual distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalResidualsState {
    pub overall: ResidualDistribution,
    /// Keyed by the `|`-joined values of the conditional columns.
    pub groups: BTreeMap<String, ResidualDistribution>,
    /// Groups that fell below `sample_size_thresh`.
    pub small_groups: Vec<String>,
    /// Groups whose residuals are all identical under a normal fit.
    pub degenerate_groups: Vec<String>,
}

impl ConditionalResidualsState {
    pub fn distribution_for(&self, key: &str) -> &ResidualDistribution {
        self.groups.get(key).unwrap_or(&self.overall)
    }
}

/// The `simple_conditional_residuals` strategy.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalResiduals;

pub type ConditionalResidualsModel = Estimator<ConditionalResiduals>;

impl ConditionalResiduals {
    fn small_group_distribution(
        settings: &ConditionalResidualsSettings,
        overall: &ResidualDistribution,
        group_stds: &[f64],
        count: usize,
    ) -> Result<ResidualDistribution> {
        let open = settings.common.require_open_quantiles().is_ok();
        match settings.small_sample_method {
            SmallSampleMethod::StdQuantiles if open => {
                let std = if group_stds.is_empty() {
                    overall.std
                } else {
                    quantile_sorted(&stats::sorted(group_stds), settings.small_sample_quantile)
                };
                let std = if std > f64::EPSILON { std } else { overall.std };
                Ok(ResidualDistribution {
                    count,
                    mean: overall.mean,
                    std,
                    offsets: ResidualDistribution::normal_offsets(
                        overall.mean,
                        std,
                        &settings.common.quantiles,
                    )?,
                })
            }
            // a normal fit cannot express the 0 / 1 quantiles, so full-coverage
            // ecdf settings fall back to the overall sample
            _ => Ok(ResidualDistribution {
                count,
                ..overall.clone()
            }),
        }
    }
}

impl UncertaintyStrategy for ConditionalResiduals {
    const METHOD: UncertaintyMethod = UncertaintyMethod::SimpleConditionalResiduals;
    type Settings = ConditionalResidualsSettings;
    type State = ConditionalResidualsState;

    fn validate(params: &Params, train: &DataFrame) -> Result<Self::Settings> {
        let settings = ConditionalResidualsSettings::parse(params)?;
        settings.check_columns(train, true)?;
        Ok(settings)
    }

    fn common(settings: &Self::Settings) -> &uncertainty_core::CommonParams {
        &settings.common
    }

    fn fit(settings: &Self::Settings, train: &DataFrame) -> Result<Self::State> {
        let common = &settings.common;
        let actual = train.floats(&common.value_col)?;
        let forecast = train.floats(&common.forecast_col)?;
        let raw: Vec<f64> = actual.iter().zip(forecast).map(|(a, f)| a - f).collect();
        let (residuals, rows) = finite_with_rows(&raw);
        if residuals.len() < raw.len() {
            tracing::debug!(
                "Dropped {} rows with missing actual or forecast values",
                raw.len() - residuals.len()
            );
        }
        if residuals.len() < MIN_RESIDUALS {
            return Err(UncertaintyError::InsufficientSamples {
                context: "residual distribution".to_string(),
                needed: MIN_RESIDUALS,
                found: residuals.len(),
            });
        }

        let overall = ResidualDistribution::estimate(&residuals, &common.quantiles, settings.estimation)?;
        if settings.estimation == QuantileEstimation::NormalFit && overall.std <= f64::EPSILON {
            return Err(UncertaintyError::DegenerateVariance(format!(
                "all {} residuals are identical; a normal fit has no spread",
                overall.count
            )));
        }

        let mut groups = BTreeMap::new();
        let mut small_groups = Vec::new();
        let mut degenerate_groups = Vec::new();
        if !settings.conditional_cols.is_empty() {
            let keys = group_keys(train, &settings.conditional_cols, &settings.time_col)?;
            let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for (&row, &r) in rows.iter().zip(&residuals) {
                buckets.entry(keys[row].clone()).or_default().push(r);
            }

            let group_stds: Vec<f64> = buckets
                .values()
                .filter(|b| b.len() >= MIN_RESIDUALS)
                .map(|b| stats::std_dev(b))
                .filter(|&std| std > f64::EPSILON)
                .collect();

            for (key, bucket) in buckets {
                let dist = if bucket.len() >= settings.sample_size_thresh.max(1) {
                    let dist = ResidualDistribution::estimate(&bucket, &common.quantiles, settings.estimation)?;
                    if settings.estimation == QuantileEstimation::NormalFit && dist.std <= f64::EPSILON {
                        degenerate_groups.push(key.clone());
                        Self::small_group_distribution(settings, &overall, &group_stds, bucket.len())?
                    } else {
                        dist
                    }
                } else {
                    small_groups.push(key.clone());
                    Self::small_group_distribution(settings, &overall, &group_stds, bucket.len())?
                };
                groups.insert(key, dist);
            }
            if !degenerate_groups.is_empty() {
                tracing::warn!(
                    "{} residual groups have no spread and borrow it from the other groups: {:?}",
                    degenerate_groups.len(),
                    degenerate_groups
                );
            }
            if !small_groups.is_empty() {
                tracing::debug!(
                    "{} of {} residual groups have fewer than {} samples",
                    small_groups.len(),
                    groups.len(),
                    settings.sample_size_thresh
                );
            }
        }

        Ok(ConditionalResidualsState {
            overall,
            groups,
            small_groups,
            degenerate_groups,
        })
    }

    fn predict(settings: &Self::Settings, state: &Self::State, future: &DataFrame) -> Result<IntervalBounds> {
        settings.check_columns(future, false)?;
        let forecast = future.floats(&settings.common.forecast_col)?;

        let dists: Vec<&ResidualDistribution> = if settings.conditional_cols.is_empty() {
            vec![&state.overall; forecast.len()]
        } else {
            let keys = group_keys(future, &settings.conditional_cols, &settings.time_col)?;
            let unseen = keys.iter().filter(|k| !state.groups.contains_key(*k)).count();
            if unseen > 0 {
                tracing::warn!(
                    "{} of {} future rows have conditions unseen in training; using all residuals",
                    unseen,
                    keys.len()
                );
            }
            keys.iter().map(|k| state.distribution_for(k)).collect()
        };

        let quantiles = (0..settings.common.quantiles.len())
            .map(|i| {
                forecast
                    .iter()
                    .zip(&dists)
                    .map(|(f, d)| f + d.offsets[i])
                    .collect()
            })
            .collect();
        let err_std = dists.iter().map(|d| d.std).collect();

        Ok(IntervalBounds {
            quantiles,
            auxiliary: vec![(ERR_STD_COL, err_std)],
        })
    }
}
