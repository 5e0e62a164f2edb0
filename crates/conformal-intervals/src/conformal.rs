//! Split conformal intervals.
//!
//! The training frame is treated as a calibration set: its residuals are the
//! nonconformity scores. For a level `c` the offset is the `k`-th smallest
//! score with `k = ceil((n + 1) * c)`, which gives finite-sample marginal
//! coverage of at least `c` for exchangeable residuals. When `k > n` the
//! calibration set is too small for the level and fitting fails.

use serde::{Deserialize, Serialize};
use uncertainty_core::stats::{self, finite_with_rows};
use uncertainty_core::{
    CommonParams, DataFrame, Estimator, IntervalBounds, Params, Result, UncertaintyError,
    UncertaintyMethod, UncertaintyStrategy,
};

use crate::settings::SplitConformalSettings;

/// Absorbs representation error in `(n + 1) * level`.
const RANK_TOLERANCE: f64 = 1e-9;

/// 1-based rank of the conformal order statistic, `None` when it exceeds `n`.
pub fn conformal_rank(n: usize, level: f64) -> Option<usize> {
    let k = ((n + 1) as f64 * level - RANK_TOLERANCE).ceil().max(0.0) as usize;
    (k <= n).then_some(k)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConformalState {
    /// Offset added to the forecast for each configured quantile.
    pub offsets: Vec<f64>,
    /// Half-width of the outer interval when fitted symmetrically.
    pub radius: Option<f64>,
    pub calibration_size: usize,
}

/// The `split_conformal` strategy.
#[derive(Debug, Clone, Copy)]
pub struct SplitConformal;

pub type SplitConformalModel = Estimator<SplitConformal>;

impl SplitConformal {
    /// Finite residuals in chronological order, restricted to the window.
    fn calibration_residuals(settings: &SplitConformalSettings, train: &DataFrame) -> Result<Vec<f64>> {
        let actual = train.floats(&settings.common.value_col)?;
        let forecast = train.floats(&settings.common.forecast_col)?;
        let raw: Vec<f64> = actual.iter().zip(forecast).map(|(a, f)| a - f).collect();
        let (mut residuals, mut rows) = finite_with_rows(&raw);

        if train.has_column(&settings.time_col) {
            let times = train.times(&settings.time_col)?;
            let mut order: Vec<usize> = (0..rows.len()).collect();
            order.sort_by_key(|&i| times[rows[i]]);
            residuals = order.iter().map(|&i| residuals[i]).collect();
            rows = order.iter().map(|&i| rows[i]).collect();
        }

        if let Some(window) = settings.recent_window {
            if residuals.len() > window {
                let start = residuals.len() - window;
                tracing::debug!(
                    "Using the latest {} of {} residuals, starting at row {}",
                    window,
                    residuals.len(),
                    rows[start]
                );
                residuals.drain(..start);
            }
        }
        Ok(residuals)
    }

    fn symmetric_offsets(residuals: &[f64], quantiles: &[f64]) -> Result<Vec<f64>> {
        let scores = stats::sorted(&residuals.iter().map(|r| r.abs()).collect::<Vec<_>>());
        let n = scores.len();
        quantiles
            .iter()
            .map(|&q| {
                let level = (2.0 * q - 1.0).abs();
                let k = conformal_rank(n, level).ok_or_else(|| insufficient(n, level))?;
                let radius = if k == 0 { 0.0 } else { scores[k - 1] };
                Ok(if q < 0.5 { -radius } else { radius })
            })
            .collect()
    }

    fn signed_offsets(residuals: &[f64], quantiles: &[f64]) -> Result<Vec<f64>> {
        let sorted = stats::sorted(residuals);
        let n = sorted.len();
        quantiles
            .iter()
            .map(|&q| {
                if q >= 0.5 {
                    let k = conformal_rank(n, q).ok_or_else(|| insufficient(n, q))?;
                    Ok(sorted[k.max(1) - 1])
                } else {
                    // k-th largest from the lower tail
                    let k = conformal_rank(n, 1.0 - q).ok_or_else(|| insufficient(n, 1.0 - q))?;
                    Ok(sorted[n - k.max(1)])
                }
            })
            .collect()
    }
}

fn insufficient(n: usize, level: f64) -> UncertaintyError {
    // smallest n with (n + 1) * level <= n
    let needed = (level / (1.0 - level) - RANK_TOLERANCE).ceil();
    UncertaintyError::InsufficientSamples {
        context: format!("conformal level {level}"),
        needed: if needed.is_finite() { needed as usize } else { n + 1 },
        found: n,
    }
}

impl UncertaintyStrategy for SplitConformal {
    const METHOD: UncertaintyMethod = UncertaintyMethod::SplitConformal;
    type Settings = SplitConformalSettings;
    type State = SplitConformalState;

    fn validate(params: &Params, train: &DataFrame) -> Result<Self::Settings> {
        let settings = SplitConformalSettings::parse(params)?;
        settings.check_columns(train, true)?;
        Ok(settings)
    }

    fn common(settings: &Self::Settings) -> &CommonParams {
        &settings.common
    }

    fn fit(settings: &Self::Settings, train: &DataFrame) -> Result<Self::State> {
        let residuals = Self::calibration_residuals(settings, train)?;
        if residuals.is_empty() {
            return Err(UncertaintyError::InsufficientSamples {
                context: "conformal calibration".to_string(),
                needed: 1,
                found: 0,
            });
        }

        let quantiles = &settings.common.quantiles;
        let offsets = if settings.symmetric {
            Self::symmetric_offsets(&residuals, quantiles)?
        } else {
            Self::signed_offsets(&residuals, quantiles)?
        };
        let radius = settings
            .symmetric
            .then(|| offsets.last().copied().unwrap_or_default());

        tracing::debug!(
            "Conformal calibration on {} residuals, offsets {:?}",
            residuals.len(),
            offsets
        );
        Ok(SplitConformalState {
            offsets,
            radius,
            calibration_size: residuals.len(),
        })
    }

    fn predict(settings: &Self::Settings, state: &Self::State, future: &DataFrame) -> Result<IntervalBounds> {
        settings.check_columns(future, false)?;
        let forecast = future.floats(&settings.common.forecast_col)?;
        let quantiles = state
            .offsets
            .iter()
            .map(|offset| forecast.iter().map(|f| f + offset).collect())
            .collect();
        Ok(IntervalBounds {
            quantiles,
            auxiliary: Vec::new(),
        })
    }
}
