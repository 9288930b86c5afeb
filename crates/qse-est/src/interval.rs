//! Confidence interval construction.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::moments::{median, percentile};
use crate::robust::block_means;

/// Interval construction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// `estimate ± z * SE`.
    Normal,
    /// Percentile bootstrap over shots.
    Bootstrap,
    /// Percentile bootstrap over median-of-means block means.
    BlockBootstrap,
    /// No usable data; the interval is the full valid range.
    FullRange,
}

impl IntervalMethod {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalMethod::Normal => "normal",
            IntervalMethod::Bootstrap => "bootstrap",
            IntervalMethod::BlockBootstrap => "block_bootstrap",
            IntervalMethod::FullRange => "full_range",
        }
    }
}

/// Interval with raw and range-clamped bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Nominal coverage `1 - alpha`.
    pub level: f64,
    /// Raw lower bound.
    pub low: f64,
    /// Raw upper bound.
    pub high: f64,
    /// Lower bound clamped to the valid range.
    pub clamped_low: f64,
    /// Upper bound clamped to the valid range.
    pub clamped_high: f64,
}

impl ConfidenceInterval {
    /// Builds an interval and its clamped copy.
    pub fn new(level: f64, low: f64, high: f64, range: (f64, f64)) -> Self {
        Self {
            level,
            low,
            high,
            clamped_low: low.clamp(range.0, range.1),
            clamped_high: high.clamp(range.0, range.1),
        }
    }

    /// Half of the raw width.
    pub fn half_width(&self) -> f64 {
        0.5 * (self.high - self.low)
    }

    /// True when `value` lies within the raw bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Data needed to rebuild an interval at any level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum IntervalModel {
    /// Normal approximation around the point estimate.
    Normal {
        /// Standard error.
        std_error: f64,
    },
    /// Sorted bootstrap replicates of the estimator.
    Bootstrap {
        /// Ascending replicate estimates.
        replicates: Vec<f64>,
    },
    /// The whole valid range.
    FullRange,
}

impl IntervalModel {
    /// Interval at significance `alpha` around `estimate`.
    pub fn interval(&self, estimate: f64, alpha: f64, range: (f64, f64)) -> ConfidenceInterval {
        let level = 1.0 - alpha;
        match self {
            IntervalModel::Normal { std_error } => {
                let half = normal_quantile(1.0 - alpha / 2.0) * std_error;
                ConfidenceInterval::new(level, estimate - half, estimate + half, range)
            }
            IntervalModel::Bootstrap { replicates } => ConfidenceInterval::new(
                level,
                percentile(replicates, alpha / 2.0),
                percentile(replicates, 1.0 - alpha / 2.0),
                range,
            ),
            IntervalModel::FullRange => ConfidenceInterval::new(level, range.0, range.1, range),
        }
    }
}

/// Standard normal quantile.
pub fn normal_quantile(p: f64) -> f64 {
    Normal::standard().inverse_cdf(p)
}

/// Percentile-bootstrap replicates of the mean (`blocks == 1`) or of the
/// median-of-means with the same block count, resampling shots.
pub(crate) fn bootstrap_shots<R: RngCore + ?Sized>(
    samples: &[f64],
    blocks: usize,
    replicates: usize,
    rng: &mut R,
) -> Vec<f64> {
    let n = samples.len();
    let mut resample = vec![0.0; n];
    let mut out: Vec<f64> = (0..replicates)
        .map(|_| {
            for slot in resample.iter_mut() {
                *slot = samples[rng.gen_range(0..n)];
            }
            if blocks <= 1 {
                resample.iter().sum::<f64>() / n as f64
            } else {
                median(&block_means(&resample, blocks))
            }
        })
        .collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Percentile-bootstrap replicates of the median over resampled block means.
pub(crate) fn bootstrap_blocks<R: RngCore + ?Sized>(
    block_means: &[f64],
    replicates: usize,
    rng: &mut R,
) -> Vec<f64> {
    let k = block_means.len();
    let mut resample = vec![0.0; k];
    let mut out: Vec<f64> = (0..replicates)
        .map(|_| {
            for slot in resample.iter_mut() {
                *slot = block_means[rng.gen_range(0..k)];
            }
            median(&resample)
        })
        .collect();
    out.sort_by(f64::total_cmp);
    out
}
