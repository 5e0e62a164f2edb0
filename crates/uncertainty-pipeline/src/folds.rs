//! Out-of-sample interval evaluation over backtest folds.
//!
//! Each fold builds its own model from a clone of the configuration, fits on
//! the fold's training frame and scores the intervals it produces on the test
//! frame. Folds are independent, so they can run in parallel.

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uncertainty_core::{CommonParams, DataFrame, UncertaintyConfig};

use crate::config::PipelineConfig;
use crate::registry::build_model;

#[derive(Debug, Clone)]
pub struct Fold {
    pub train: DataFrame,
    /// Future rows with their actual values.
    pub test: DataFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: usize,
    /// Test rows with a finite actual value.
    pub rows: usize,
    /// Share of scored rows inside the interval.
    pub coverage: Option<f64>,
    pub mean_width: Option<f64>,
    pub interval_score: Option<f64>,
    pub error: Option<String>,
}

impl FoldReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub folds: usize,
    pub failed: usize,
    pub target_coverage: f64,
    pub mean_coverage: f64,
    pub mean_width: f64,
    pub mean_interval_score: f64,
}

/// Winkler interval score: width plus `2 / alpha` times the distance by which
/// `actual` falls outside the interval.
pub fn winkler_score(lower: f64, upper: f64, actual: f64, alpha: f64) -> f64 {
    let width = upper - lower;
    let miss = if actual < lower {
        lower - actual
    } else if actual > upper {
        actual - upper
    } else {
        return width;
    };
    if alpha > 0.0 {
        width + 2.0 / alpha * miss
    } else {
        f64::INFINITY
    }
}

struct FoldMetrics {
    rows: usize,
    coverage: f64,
    mean_width: f64,
    interval_score: f64,
}

fn score_fold(config: &UncertaintyConfig, fold: &Fold) -> Result<FoldMetrics> {
    let common = CommonParams::parse(&config.effective_params())?;
    let actual = fold
        .test
        .floats(&common.value_col)
        .context("test frame needs actual values")?;

    let mut model = build_model(config.clone())?;
    model.fit(fold.train.clone()).context("fit failed")?;
    let prediction = model.predict(&fold.test).context("predict failed")?;
    let alpha = 1.0 - prediction.coverage;

    let mut rows = 0;
    let mut covered = 0;
    let mut width = 0.0;
    let mut score = 0.0;
    for ((&y, &lo), &hi) in actual.iter().zip(prediction.lower()).zip(prediction.upper()) {
        if !(y.is_finite() && lo.is_finite() && hi.is_finite()) {
            continue;
        }
        rows += 1;
        if lo <= y && y <= hi {
            covered += 1;
        }
        width += hi - lo;
        score += winkler_score(lo, hi, y, alpha);
    }
    if rows == 0 {
        return Err(anyhow!("no test rows with finite actuals and bounds"));
    }

    let n = rows as f64;
    Ok(FoldMetrics {
        rows,
        coverage: covered as f64 / n,
        mean_width: width / n,
        interval_score: score / n,
    })
}

fn evaluate_fold(config: &UncertaintyConfig, index: usize, fold: &Fold) -> FoldReport {
    match score_fold(config, fold) {
        Ok(m) => FoldReport {
            fold: index,
            rows: m.rows,
            coverage: Some(m.coverage),
            mean_width: Some(m.mean_width),
            interval_score: Some(m.interval_score),
            error: None,
        },
        Err(e) => {
            tracing::warn!("Fold {} failed: {:#}", index, e);
            FoldReport {
                fold: index,
                rows: 0,
                coverage: None,
                mean_width: None,
                interval_score: None,
                error: Some(format!("{e:#}")),
            }
        }
    }
}

/// Evaluates every fold; a failed fold is reported, not propagated.
pub fn evaluate_folds(config: &UncertaintyConfig, folds: &[Fold], parallel: bool) -> Vec<FoldReport> {
    let reports: Vec<FoldReport> = if parallel {
        folds
            .par_iter()
            .enumerate()
            .map(|(i, fold)| evaluate_fold(config, i, fold))
            .collect()
    } else {
        folds
            .iter()
            .enumerate()
            .map(|(i, fold)| evaluate_fold(config, i, fold))
            .collect()
    };

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    tracing::info!(
        "Evaluated {} uncertainty folds with {} ({} failed)",
        reports.len(),
        config.method,
        failed
    );
    reports
}

/// Evaluates folds with the pipeline's uncertainty config and `parallel_folds` setting.
pub fn evaluate_folds_with(config: &PipelineConfig, folds: &[Fold]) -> Result<Vec<FoldReport>> {
    let uncertainty = config
        .uncertainty
        .as_ref()
        .ok_or_else(|| anyhow!("no uncertainty method configured; nothing to evaluate"))?;
    Ok(evaluate_folds(uncertainty, folds, config.parallel_folds))
}

/// Averages the successful folds.
pub fn summarize(config: &UncertaintyConfig, reports: &[FoldReport]) -> Result<EvaluationSummary> {
    let ok: Vec<&FoldReport> = reports.iter().filter(|r| r.is_ok()).collect();
    if ok.is_empty() {
        return Err(anyhow!("all {} folds failed", reports.len()));
    }
    let target_coverage = CommonParams::parse(&config.effective_params())?.coverage;
    let n = ok.len() as f64;
    let mean_of = |f: fn(&FoldReport) -> Option<f64>| ok.iter().filter_map(|r| f(r)).sum::<f64>() / n;

    Ok(EvaluationSummary {
        folds: reports.len(),
        failed: reports.len() - ok.len(),
        target_coverage,
        mean_coverage: mean_of(|r| r.coverage),
        mean_width: mean_of(|r| r.mean_width),
        mean_interval_score: mean_of(|r| r.interval_score),
    })
}
