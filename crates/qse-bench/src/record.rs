//! Long-form benchmark rows, one per (triple, observable).

use serde::{Deserialize, Serialize};

use qse_core::{ObservableId, ObservableSet, TruthValue};
use qse_est::{IntervalMethod, ObservableEstimate};
use qse_proto::{ExecutionOutcome, RunStatus};

/// Identifies one (protocol, budget, replicate) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripleKey {
    /// Protocol name.
    pub protocol: String,
    /// Protocol position in the sweep configuration.
    pub protocol_index: usize,
    /// Position of the budget in the shot grid.
    pub grid_index: usize,
    /// Shot budget.
    pub n_shots: u64,
    /// Replicate index.
    pub replicate: usize,
    /// Seed derived for this triple.
    pub seed: u64,
}

/// One output row. Estimate fields are empty for failed triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Protocol name.
    pub protocol: String,
    /// Protocol position in the sweep configuration.
    pub protocol_index: usize,
    /// Shot budget.
    pub n_shots: u64,
    /// Position of the budget in the shot grid.
    pub grid_index: usize,
    /// Shots actually folded in.
    pub shots_used: u64,
    /// Replicate index.
    pub replicate: usize,
    /// Triple seed.
    pub seed: u64,
    /// Observable identifier.
    pub observable_id: ObservableId,
    /// Observable position in the set.
    pub observable_index: usize,
    /// Point estimate.
    pub estimate: Option<f64>,
    /// Standard error.
    pub std_error: Option<f64>,
    /// Raw lower bound.
    pub ci_low: Option<f64>,
    /// Raw upper bound.
    pub ci_high: Option<f64>,
    /// Lower bound clamped to the valid range.
    pub ci_low_clamped: Option<f64>,
    /// Upper bound clamped to the valid range.
    pub ci_high_clamped: Option<f64>,
    /// Interval construction method.
    pub method: Option<IntervalMethod>,
    /// Effective sample size proxy.
    pub effective_samples: Option<usize>,
    /// Heavy-tail diagnostic flag.
    pub heavy_tail: bool,
    /// Readout correction fell back to a pseudo-inverse.
    pub noise_fallback: bool,
    /// Reference value.
    pub truth: Option<f64>,
    /// Uncertainty of the reference value.
    pub truth_uncertainty: Option<f64>,
    /// `|estimate - truth|`.
    pub abs_error: Option<f64>,
    /// `(estimate - truth)^2`.
    pub sq_error: Option<f64>,
    /// Whether the raw interval contains the truth.
    pub covered: Option<bool>,
    /// Status of the triple.
    pub status: RunStatus,
}

impl BenchmarkRecord {
    fn empty(
        key: &TripleKey,
        id: ObservableId,
        index: usize,
        shots_used: u64,
        status: RunStatus,
        truth: Option<TruthValue>,
    ) -> Self {
        Self {
            protocol: key.protocol.clone(),
            protocol_index: key.protocol_index,
            n_shots: key.n_shots,
            grid_index: key.grid_index,
            shots_used,
            replicate: key.replicate,
            seed: key.seed,
            observable_id: id,
            observable_index: index,
            estimate: None,
            std_error: None,
            ci_low: None,
            ci_high: None,
            ci_low_clamped: None,
            ci_high_clamped: None,
            method: None,
            effective_samples: None,
            heavy_tail: false,
            noise_fallback: false,
            truth: truth.map(|t| t.value),
            truth_uncertainty: truth.map(|t| t.uncertainty),
            abs_error: None,
            sq_error: None,
            covered: None,
            status,
        }
    }

    /// Row for a finalized estimate.
    pub fn from_estimate(
        key: &TripleKey,
        shots_used: u64,
        status: RunStatus,
        entry: &ObservableEstimate,
        truth: Option<TruthValue>,
    ) -> Self {
        let mut record = Self::empty(key, entry.id.clone(), entry.index, shots_used, status, truth);
        let interval = &entry.interval;
        record.estimate = Some(entry.estimate);
        record.std_error = Some(entry.std_error);
        record.ci_low = Some(interval.low);
        record.ci_high = Some(interval.high);
        record.ci_low_clamped = Some(interval.clamped_low);
        record.ci_high_clamped = Some(interval.clamped_high);
        record.method = Some(entry.diagnostics.method);
        record.effective_samples = Some(entry.diagnostics.effective_samples);
        record.heavy_tail = entry.diagnostics.heavy_tail;
        record.noise_fallback = entry.diagnostics.noise_fallback;
        if let Some(truth) = truth {
            let error = entry.estimate - truth.value;
            record.abs_error = Some(error.abs());
            record.sq_error = Some(error * error);
            record.covered = Some(interval.contains(truth.value));
        }
        record
    }

    /// Row with empty estimate fields for a failed triple.
    pub fn failed(key: &TripleKey, id: ObservableId, index: usize, truth: Option<TruthValue>) -> Self {
        Self::empty(key, id, index, 0, RunStatus::Failed, truth)
    }
}

/// Rows for every observable of one triple.
///
/// `outcome` is `None` when the run never produced estimates; a failed
/// outcome likewise yields empty estimate fields.
pub fn records_for_triple(
    key: &TripleKey,
    observables: &ObservableSet,
    outcome: Option<&ExecutionOutcome>,
    truths: &[Option<TruthValue>],
) -> Vec<BenchmarkRecord> {
    let truth_at = |idx: usize| truths.get(idx).copied().flatten();
    match outcome {
        Some(outcome) if outcome.status != RunStatus::Failed => outcome
            .estimates
            .iter()
            .map(|entry| {
                BenchmarkRecord::from_estimate(
                    key,
                    outcome.shots_used(),
                    outcome.status,
                    entry,
                    truth_at(entry.index),
                )
            })
            .collect(),
        _ => observables
            .iter()
            .enumerate()
            .map(|(idx, observable)| {
                BenchmarkRecord::failed(key, observable.id().clone(), idx, truth_at(idx))
            })
            .collect(),
    }
}
