//! Final per-observable estimates and their diagnostics.

use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use qse_core::{Observable, ObservableId};

use crate::config::EstimatorConfig;
use crate::interval::{bootstrap_blocks, bootstrap_shots, ConfidenceInterval, IntervalMethod, IntervalModel};
use crate::moments::{kurtosis_ratio, SampleMoments};
use crate::reconstruct::ObservableAccumulator;
use crate::robust::{choose_blocks, median_of_means};

/// Diagnostics attached to every estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Shots folded into the estimate.
    pub samples: usize,
    /// Effective sample size proxy (shots with a non-zero contribution).
    pub effective_samples: usize,
    /// Kurtosis ratio of the per-shot values.
    pub tail_ratio: f64,
    /// Tail ratio reached the configured threshold.
    pub heavy_tail: bool,
    /// Median-of-means block count.
    pub blocks: usize,
    /// Interval construction method.
    pub method: IntervalMethod,
    /// A pseudo-inverse replaced an ill-conditioned readout matrix.
    pub noise_fallback: bool,
    /// No usable shots; the interval spans the full valid range.
    pub insufficient_data: bool,
}

/// Estimate of one observable's expectation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableEstimate {
    /// Observable identifier.
    pub id: ObservableId,
    /// Reporting index in the observable set.
    pub index: usize,
    /// Observable coefficient; the valid range is `[-|c|, |c|]`.
    pub coefficient: f64,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// Empirical variance across shots or blocks.
    pub variance: f64,
    /// Interval at the run's confidence level.
    pub interval: ConfidenceInterval,
    /// Diagnostics.
    pub diagnostics: Diagnostics,
    /// Model used to rebuild intervals at other levels.
    pub model: IntervalModel,
}

impl ObservableEstimate {
    /// Range the expectation value is confined to.
    pub fn valid_range(&self) -> (f64, f64) {
        let bound = self.coefficient.abs();
        (-bound, bound)
    }

    /// Interval at significance `alpha` from the same model.
    pub fn interval_at(&self, alpha: f64) -> ConfidenceInterval {
        self.model.interval(self.estimate, alpha, self.valid_range())
    }

    /// Raw half-width at the run's confidence level.
    pub fn half_width(&self) -> f64 {
        self.interval.half_width()
    }
}

/// Estimates for a whole observable set, in reporting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimates {
    /// One entry per observable.
    pub entries: Vec<ObservableEstimate>,
    /// Shots actually folded in.
    pub shots_used: u64,
    /// Confidence level of the per-observable intervals.
    pub confidence_level: f64,
}

impl Estimates {
    /// Number of observables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no observable is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `id`.
    pub fn get(&self, id: &ObservableId) -> Option<&ObservableEstimate> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Iterates in reporting order.
    pub fn iter(&self) -> std::slice::Iter<'_, ObservableEstimate> {
        self.entries.iter()
    }

    /// Largest per-observable half-width.
    pub fn max_half_width(&self) -> f64 {
        self.entries
            .iter()
            .map(ObservableEstimate::half_width)
            .fold(0.0, f64::max)
    }

    /// True when any estimate relied on a pseudo-inverse.
    pub fn any_noise_fallback(&self) -> bool {
        self.entries.iter().any(|entry| entry.diagnostics.noise_fallback)
    }
}

/// Builds the estimate of `observable` from its accumulated shots.
///
/// Blocking, interval method selection and resampling follow `config`. All
/// randomness (block shuffles, bootstrap draws) comes from `rng`.
pub fn estimate_observable<R: RngCore + ?Sized>(
    observable: &Observable,
    index: usize,
    accumulator: &ObservableAccumulator,
    config: &EstimatorConfig,
    confidence_level: f64,
    noise_fallback: bool,
    rng: &mut R,
) -> ObservableEstimate {
    let range = observable.valid_range();
    let alpha = 1.0 - confidence_level;
    let samples = accumulator.samples();
    let effective_samples = accumulator.effective_samples();

    if samples.is_empty() || effective_samples == 0 {
        let model = IntervalModel::FullRange;
        return ObservableEstimate {
            id: observable.id().clone(),
            index,
            coefficient: observable.coefficient(),
            estimate: 0.0,
            std_error: observable.coefficient().abs(),
            variance: 0.0,
            interval: model.interval(0.0, alpha, range),
            diagnostics: Diagnostics {
                samples: samples.len(),
                effective_samples,
                tail_ratio: 0.0,
                heavy_tail: false,
                blocks: 0,
                method: IntervalMethod::FullRange,
                noise_fallback,
                insufficient_data: true,
            },
            model,
        };
    }

    let tail_ratio = kurtosis_ratio(samples);
    let heavy_tail = tail_ratio >= config.tail_threshold;
    let blocks = choose_blocks(config.blocks, samples.len(), tail_ratio, config.tail_threshold, alpha);
    let mom = median_of_means(samples, blocks, rng);

    let automatic = if effective_samples >= config.ess_threshold && !heavy_tail {
        IntervalMethod::Normal
    } else if config.block_bootstrap && blocks > 1 {
        IntervalMethod::BlockBootstrap
    } else {
        IntervalMethod::Bootstrap
    };
    let mut method = match config.method {
        Some(IntervalMethod::BlockBootstrap) if blocks == 1 => IntervalMethod::Bootstrap,
        Some(forced) => forced,
        None => {
            if automatic != IntervalMethod::Normal {
                warn!(
                    "{}: ess={} tail_ratio={:.2}; using {} interval",
                    observable.id(),
                    effective_samples,
                    tail_ratio,
                    automatic.as_str()
                );
            }
            automatic
        }
    };

    let (mut model, mut std_error) = match method {
        IntervalMethod::Normal | IntervalMethod::FullRange => (
            IntervalModel::Normal {
                std_error: mom.std_error,
            },
            mom.std_error,
        ),
        IntervalMethod::Bootstrap => {
            let replicates = bootstrap_shots(samples, blocks, config.bootstrap_replicates, rng);
            let spread = SampleMoments::of(&replicates).std_dev();
            (IntervalModel::Bootstrap { replicates }, spread)
        }
        IntervalMethod::BlockBootstrap => {
            let replicates = bootstrap_blocks(&mom.block_means, config.bootstrap_replicates, rng);
            let spread = SampleMoments::of(&replicates).std_dev();
            (IntervalModel::Bootstrap { replicates }, spread)
        }
    };

    let floor = pseudo_count_std_error(samples);
    if std_error < floor {
        debug!(
            "{}: spread {:.3e} below pseudo-count floor {:.3e}; using normal interval",
            observable.id(),
            std_error,
            floor
        );
        model = IntervalModel::Normal { std_error: floor };
        std_error = floor;
        method = IntervalMethod::Normal;
    }

    ObservableEstimate {
        id: observable.id().clone(),
        index,
        coefficient: observable.coefficient(),
        estimate: mom.estimate,
        std_error,
        variance: mom.variance,
        interval: model.interval(mom.estimate, alpha, range),
        diagnostics: Diagnostics {
            samples: samples.len(),
            effective_samples,
            tail_ratio,
            heavy_tail,
            blocks,
            method,
            noise_fallback,
            insufficient_data: false,
        },
        model,
    }
}

/// Standard error of the mean of a constant sample of magnitude `b` after
/// one `+b` and one `-b` pseudo-shot are added, `b` being the largest
/// per-shot magnitude seen.
///
/// Near-constant samples at the edge of the valid range would otherwise get
/// a zero-width interval.
fn pseudo_count_std_error(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let bound = samples.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    let variance = bound * bound * 4.0 * (n + 1.0) / ((n + 2.0) * (n + 2.0));
    (variance / n).sqrt()
}
