//! Per-observable metrics and their fixed-budget distribution.

use serde::{Deserialize, Serialize};

use qse_core::{QseError, TruthValue};
use qse_est::{percentile, Estimates};

use crate::truth::check_truths;

/// Per-observable quantity compared across protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Raw interval half-width at the run's confidence level.
    HalfWidth,
    /// `|estimate - truth|`; needs reference values.
    AbsError,
}

/// Evaluates `metric` for every observable, in reporting order.
pub fn observable_metric(
    estimates: &Estimates,
    metric: Metric,
    truths: Option<&[TruthValue]>,
) -> Result<Vec<f64>, QseError> {
    match metric {
        Metric::HalfWidth => Ok(estimates.iter().map(|entry| entry.half_width()).collect()),
        Metric::AbsError => {
            let truths = truths.ok_or_else(|| {
                QseError::config("missing-truth", "absolute errors need reference values")
            })?;
            check_truths(estimates, truths)?;
            Ok(estimates
                .iter()
                .zip(truths)
                .map(|(entry, truth)| (entry.estimate - truth.value).abs())
                .collect())
        }
    }
}

/// Percentile summary across observables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Number of observables summarised.
    pub count: usize,
    /// 50th percentile.
    pub median: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

impl DistributionSummary {
    /// Summarises `values` with linear-interpolation percentiles.
    pub fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mean = if sorted.is_empty() {
            f64::NAN
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        Self {
            count: sorted.len(),
            median: percentile(&sorted, 0.5),
            p90: percentile(&sorted, 0.9),
            p95: percentile(&sorted, 0.95),
            max: sorted.last().copied().unwrap_or(f64::NAN),
            mean,
        }
    }
}

/// Distribution of `metric` across observables at one budget.
pub fn fixed_budget_distribution(
    estimates: &Estimates,
    metric: Metric,
    truths: Option<&[TruthValue]>,
) -> Result<DistributionSummary, QseError> {
    if estimates.is_empty() {
        return Err(QseError::config("empty-estimates", "nothing to summarise"));
    }
    Ok(DistributionSummary::of(&observable_metric(estimates, metric, truths)?))
}
