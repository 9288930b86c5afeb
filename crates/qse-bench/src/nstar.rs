//! Shots-to-target searches over a [`ShotSeries`].

use log::debug;
use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, ObservableId, QseError};
use qse_est::{median, simultaneous_intervals, Estimates, FwerSpec};

use crate::series::ShotSeries;

/// Result of a minimal-budget search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NStar {
    /// Smallest grid budget meeting the criterion.
    Found {
        /// Budget.
        n: u64,
        /// Position in the grid.
        grid_index: usize,
    },
    /// No grid budget met the criterion.
    NotFound {
        /// Largest budget evaluated.
        largest_n: u64,
        /// Observables still failing at `largest_n`.
        blocking: Vec<ObservableId>,
    },
}

impl NStar {
    /// Budget when found.
    pub fn n(&self) -> Option<u64> {
        match self {
            NStar::Found { n, .. } => Some(*n),
            NStar::NotFound { .. } => None,
        }
    }

    /// True when a budget was found.
    pub fn is_found(&self) -> bool {
        matches!(self, NStar::Found { .. })
    }

    /// Blocking observables; empty when found.
    pub fn blocking(&self) -> &[ObservableId] {
        match self {
            NStar::Found { .. } => &[],
            NStar::NotFound { blocking, .. } => blocking,
        }
    }
}

/// Aggregate of per-observable half-widths for the average target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregate {
    /// Arithmetic mean.
    Mean,
    /// Median.
    Median,
    /// `(mean |w|^p)^(1/p)`.
    Lp {
        /// Norm exponent, at least 1.
        p: f64,
    },
}

impl Aggregate {
    fn validate(&self) -> Result<(), QseError> {
        match self {
            Aggregate::Lp { p } if !(p.is_finite() && *p >= 1.0) => Err(QseError::Configuration(
                ErrorInfo::new("invalid-norm", "Lp exponent must be finite and at least 1")
                    .with_context("p", p),
            )),
            _ => Ok(()),
        }
    }

    /// Applies the aggregate to `values`.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        let count = values.len() as f64;
        match self {
            Aggregate::Mean => values.iter().sum::<f64>() / count,
            Aggregate::Median => median(values),
            Aggregate::Lp { p } => {
                (values.iter().map(|v| v.abs().powf(*p)).sum::<f64>() / count).powf(1.0 / p)
            }
        }
    }
}

/// Rejects accuracy targets that are not positive and finite.
pub fn validate_epsilon(epsilon: f64) -> Result<(), QseError> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(QseError::Configuration(
            ErrorInfo::new("invalid-epsilon", "accuracy target must be positive")
                .with_context("epsilon", epsilon),
        ))
    }
}

/// Simultaneous half-widths of one estimate set.
pub(crate) fn simultaneous_half_widths(
    estimates: &Estimates,
    fwer: &FwerSpec,
) -> Result<Vec<f64>, QseError> {
    Ok(simultaneous_intervals(estimates, fwer)?.half_widths())
}

fn blocking_ids(estimates: &Estimates, widths: &[f64], epsilon: f64) -> Vec<ObservableId> {
    estimates
        .iter()
        .zip(widths)
        .filter(|(_, &width)| width > epsilon)
        .map(|(entry, _)| entry.id.clone())
        .collect()
}

/// Smallest budget at which every simultaneous half-width is at most `epsilon`.
pub fn worst_case_n_star(series: &ShotSeries, epsilon: f64, fwer: &FwerSpec) -> Result<NStar, QseError> {
    validate_epsilon(epsilon)?;
    fwer.validate()?;
    for (grid_index, point) in series.points().iter().enumerate() {
        let widths = simultaneous_half_widths(&point.estimates, fwer)?;
        if widths.iter().all(|&width| width <= epsilon) {
            debug!("{}: worst-case N* = {} at epsilon {epsilon}", series.protocol(), point.n);
            return Ok(NStar::Found { n: point.n, grid_index });
        }
    }
    let last = series.last();
    let widths = simultaneous_half_widths(&last.estimates, fwer)?;
    Ok(NStar::NotFound {
        largest_n: last.n,
        blocking: blocking_ids(&last.estimates, &widths, epsilon),
    })
}

/// Smallest budget at which the aggregate of per-observable half-widths is at most `epsilon`.
///
/// Half-widths are taken at each estimate's own confidence level.
pub fn average_target_n_star(
    series: &ShotSeries,
    epsilon: f64,
    aggregate: Aggregate,
) -> Result<NStar, QseError> {
    validate_epsilon(epsilon)?;
    aggregate.validate()?;
    for (grid_index, point) in series.points().iter().enumerate() {
        let widths: Vec<f64> = point.estimates.iter().map(|e| e.half_width()).collect();
        if aggregate.apply(&widths) <= epsilon {
            return Ok(NStar::Found { n: point.n, grid_index });
        }
    }
    let last = series.last();
    let widths: Vec<f64> = last.estimates.iter().map(|e| e.half_width()).collect();
    Ok(NStar::NotFound {
        largest_n: last.n,
        blocking: blocking_ids(&last.estimates, &widths, epsilon),
    })
}

/// Shot-savings factor `N*_baseline / N*_candidate`, when both were found.
pub fn shot_savings_factor(candidate: &NStar, baseline: &NStar) -> Option<f64> {
    match (candidate.n(), baseline.n()) {
        (Some(c), Some(b)) if c > 0 => Some(b as f64 / c as f64),
        _ => None,
    }
}
