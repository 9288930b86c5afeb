//! Per-shot values for fixed-basis and randomized-basis data.

use serde::{Deserialize, Serialize};

use qse_core::{Bitstring, Observable, Pauli, RawDatasetChunk};

use crate::moments::SampleMoments;
use crate::readout::ParityWeights;

/// Inverse of the single-site randomized channel for a matched basis.
const SHADOW_SITE_FACTOR: f64 = 3.0;

/// Single-shot value of `observable` from a compatible fixed setting.
///
/// Even parity on the support contributes `+c`, odd parity `-c`; corrected
/// weights replace the signs when readout correction is active.
pub fn direct_value(observable: &Observable, weights: &ParityWeights, outcome: &Bitstring) -> f64 {
    observable.coefficient() * weights.weight(outcome)
}

/// Single-shot shadow snapshot value of `observable`.
///
/// A shot contributes only if every support site was measured in the
/// observable's basis; the inverted channel then scales it by `3^k`.
pub fn shadow_value(
    observable: &Observable,
    weights: &ParityWeights,
    bases: &[Pauli],
    outcome: &Bitstring,
) -> f64 {
    let mut factor = observable.coefficient();
    for (site, pauli) in observable.support() {
        if bases[site] != pauli {
            return 0.0;
        }
        factor *= SHADOW_SITE_FACTOR;
    }
    factor * weights.weight(outcome)
}

/// Running per-observable statistics plus the retained per-shot values.
///
/// The values are kept for median-of-means blocking and resampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservableAccumulator {
    samples: Vec<f64>,
    sum: f64,
    sum_sq: f64,
    nonzero: usize,
}

impl ObservableAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one per-shot value.
    pub fn push(&mut self, value: f64) {
        self.push_repeated(value, 1);
    }

    /// Records the same per-shot value `count` times.
    pub fn push_repeated(&mut self, value: f64, count: u64) {
        let count_usize = count as usize;
        self.samples.extend(std::iter::repeat(value).take(count_usize));
        self.sum += value * count as f64;
        self.sum_sq += value * value * count as f64;
        if value != 0.0 {
            self.nonzero += count_usize;
        }
    }

    /// Folds a fixed-setting chunk; the caller guarantees compatibility.
    pub fn fold_direct(&mut self, chunk: &RawDatasetChunk, observable: &Observable, weights: &ParityWeights) {
        for (outcome, &count) in &chunk.counts {
            self.push_repeated(direct_value(observable, weights, outcome), count);
        }
    }

    /// Folds a randomized chunk shot by shot.
    pub fn fold_shadow(&mut self, chunk: &RawDatasetChunk, observable: &Observable, weights: &ParityWeights) {
        for shot in &chunk.shots {
            self.push(shadow_value(observable, weights, &shot.bases, &shot.outcome));
        }
    }

    /// Number of recorded shots.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before any shot has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Effective sample size proxy: shots with a non-zero contribution.
    pub fn effective_samples(&self) -> usize {
        self.nonzero
    }

    /// Recorded per-shot values in arrival order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mean and unbiased variance from the running sums.
    pub fn running_moments(&self) -> SampleMoments {
        let count = self.samples.len();
        if count == 0 {
            return SampleMoments::of(&[]);
        }
        let n = count as f64;
        let mean = self.sum / n;
        let variance = if count > 1 {
            ((self.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0)
        } else {
            0.0
        };
        SampleMoments {
            count,
            mean,
            variance,
        }
    }
}
