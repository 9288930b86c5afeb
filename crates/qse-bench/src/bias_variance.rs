//! Bias-variance decomposition across independent replicates.

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, ObservableId, QseError, TruthValue};
use qse_est::Estimates;

use crate::truth::check_truths;

/// Decomposition for one observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasVarianceEntry {
    /// Observable identifier.
    pub id: ObservableId,
    /// Reference value.
    pub truth: TruthValue,
    /// Mean estimate across replicates.
    pub mean_estimate: f64,
    /// `mean_estimate - truth`.
    pub bias: f64,
    /// Population variance of the estimates across replicates.
    pub variance: f64,
    /// `bias^2 + variance`.
    pub mse: f64,
}

/// Decomposition for every observable at one budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasVarianceReport {
    /// Replicates used.
    pub replicates: usize,
    /// Per-observable entries in reporting order.
    pub entries: Vec<BiasVarianceEntry>,
}

impl BiasVarianceReport {
    /// Mean of the per-observable MSE values.
    pub fn mean_mse(&self) -> f64 {
        if self.entries.is_empty() {
            return f64::NAN;
        }
        self.entries.iter().map(|e| e.mse).sum::<f64>() / self.entries.len() as f64
    }
}

/// Decomposes the error of `replicates` against `truths`.
///
/// Every replicate must report the same observables in the same order.
pub fn bias_variance(
    replicates: &[Estimates],
    truths: &[TruthValue],
) -> Result<BiasVarianceReport, QseError> {
    let Some(first) = replicates.first() else {
        return Err(QseError::config("empty-replicates", "bias-variance needs at least one replicate"));
    };
    check_truths(first, truths)?;
    for (idx, replicate) in replicates.iter().enumerate() {
        let aligned = replicate.len() == first.len()
            && replicate.iter().zip(first.iter()).all(|(a, b)| a.id == b.id);
        if !aligned {
            return Err(QseError::Configuration(
                ErrorInfo::new("observable-mismatch", "replicates report different observables")
                    .with_context("replicate", idx),
            ));
        }
    }
    let count = replicates.len() as f64;
    let entries = first
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let values: Vec<f64> = replicates.iter().map(|r| r.entries[idx].estimate).collect();
            let mean_estimate = values.iter().sum::<f64>() / count;
            let variance = values.iter().map(|v| (v - mean_estimate).powi(2)).sum::<f64>() / count;
            let truth = truths[idx];
            let bias = mean_estimate - truth.value;
            BiasVarianceEntry {
                id: entry.id.clone(),
                truth,
                mean_estimate,
                bias,
                variance,
                mse: bias * bias + variance,
            }
        })
        .collect();
    Ok(BiasVarianceReport {
        replicates: replicates.len(),
        entries,
    })
}
