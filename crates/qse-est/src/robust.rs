//! Median-of-means averaging.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::moments::{median, SampleMoments};

/// Smallest number of samples a block may hold under [`BlockPolicy::Auto`].
pub const MIN_BLOCK_SAMPLES: usize = 10;

/// How the number of median-of-means blocks is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// One block unless the tail diagnostic fires, then `ceil(8 ln(1/alpha))`.
    Auto,
    /// Exactly `K` blocks (clamped to the sample count).
    Fixed(usize),
}

impl Default for BlockPolicy {
    fn default() -> Self {
        BlockPolicy::Auto
    }
}

/// Resolves the block count for `samples` samples.
pub fn choose_blocks(
    policy: BlockPolicy,
    samples: usize,
    tail_ratio: f64,
    tail_threshold: f64,
    alpha: f64,
) -> usize {
    if samples == 0 {
        return 1;
    }
    match policy {
        BlockPolicy::Fixed(k) => k.clamp(1, samples),
        BlockPolicy::Auto => {
            if tail_ratio < tail_threshold {
                return 1;
            }
            let wanted = (8.0 * (1.0 / alpha).ln()).ceil().max(1.0) as usize;
            wanted.min(samples / MIN_BLOCK_SAMPLES).max(1)
        }
    }
}

/// Output of [`median_of_means`].
#[derive(Debug, Clone, PartialEq)]
pub struct MedianOfMeans {
    /// Point estimate: the median of block means, or the mean when `K = 1`.
    pub estimate: f64,
    /// Standard error of the point estimate.
    pub std_error: f64,
    /// Variance across shots (`K = 1`) or across block means.
    pub variance: f64,
    /// Per-block means, in block order.
    pub block_means: Vec<f64>,
}

/// Median of `blocks` contiguous block means after a seeded shuffle.
///
/// With one block no shuffle happens and the result is the plain mean with
/// its usual standard error. Otherwise the standard error is
/// `sqrt(pi/2) * sd(block means) / sqrt(K)`, the asymptotic efficiency loss
/// of the median. Trailing samples that do not fill a block are spread over
/// the first blocks so every sample is used.
pub fn median_of_means<R: RngCore + ?Sized>(
    samples: &[f64],
    blocks: usize,
    rng: &mut R,
) -> MedianOfMeans {
    let moments = SampleMoments::of(samples);
    let blocks = blocks.clamp(1, samples.len().max(1));
    if blocks == 1 {
        return MedianOfMeans {
            estimate: moments.mean,
            std_error: moments.std_error(),
            variance: moments.variance,
            block_means: vec![moments.mean],
        };
    }

    let mut shuffled = samples.to_vec();
    shuffled.shuffle(rng);
    let block_means = block_means(&shuffled, blocks);
    let spread = SampleMoments::of(&block_means);
    MedianOfMeans {
        estimate: median(&block_means),
        std_error: (std::f64::consts::FRAC_PI_2).sqrt() * spread.std_dev() / (blocks as f64).sqrt(),
        variance: spread.variance,
        block_means,
    }
}

/// Means of `blocks` near-equal contiguous blocks.
pub(crate) fn block_means(values: &[f64], blocks: usize) -> Vec<f64> {
    let base = values.len() / blocks;
    let extra = values.len() % blocks;
    let mut start = 0;
    (0..blocks)
        .map(|block| {
            let len = base + usize::from(block < extra);
            let slice = &values[start..start + len];
            start += len;
            slice.iter().sum::<f64>() / len as f64
        })
        .collect()
}
