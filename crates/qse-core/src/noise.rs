//! Readout noise descriptors supplied by the caller.
//!
//! A descriptor only describes the channel. Inverting it is the job of the
//! estimator crate, which owns the numerical fallback policy.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QseError};

/// Single-site readout confusion probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadoutConfusion {
    /// Probability of reading `1` when the true outcome is `0`.
    pub p1_given_0: f64,
    /// Probability of reading `0` when the true outcome is `1`.
    pub p0_given_1: f64,
}

impl ReadoutConfusion {
    /// Creates a confusion descriptor.
    pub fn new(p1_given_0: f64, p0_given_1: f64) -> Self {
        Self {
            p1_given_0,
            p0_given_1,
        }
    }

    /// Noise-free readout.
    pub fn ideal() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Column-stochastic matrix `A[measured][true]`.
    pub fn matrix(&self) -> [[f64; 2]; 2] {
        [
            [1.0 - self.p1_given_0, self.p0_given_1],
            [self.p1_given_0, 1.0 - self.p0_given_1],
        ]
    }

    fn validate(&self, site: Option<usize>) -> Result<(), QseError> {
        for (name, value) in [("p1_given_0", self.p1_given_0), ("p0_given_1", self.p0_given_1)] {
            if !(0.0..=1.0).contains(&value) {
                let mut info = ErrorInfo::new("invalid-confusion", "confusion probabilities lie in [0, 1]")
                    .with_context("field", name)
                    .with_context("value", value);
                if let Some(site) = site {
                    info = info.with_context("site", site);
                }
                return Err(QseError::Configuration(info));
            }
        }
        Ok(())
    }
}

/// Measurement noise channel description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum NoiseDescriptor {
    /// Same confusion on every site.
    Uniform(ReadoutConfusion),
    /// One confusion entry per site.
    PerSite(Vec<ReadoutConfusion>),
    /// Correlated readout over all `sites` sites, indexed by little-endian outcome.
    Joint {
        /// Number of sites the matrix covers.
        sites: usize,
        /// Row-major `2^sites x 2^sites` matrix `A[measured][true]`.
        matrix: Vec<Vec<f64>>,
    },
}

impl NoiseDescriptor {
    /// Confusion for one site, or `None` for joint descriptors.
    pub fn site(&self, site: usize) -> Option<ReadoutConfusion> {
        match self {
            NoiseDescriptor::Uniform(confusion) => Some(*confusion),
            NoiseDescriptor::PerSite(entries) => entries.get(site).copied(),
            NoiseDescriptor::Joint { .. } => None,
        }
    }

    /// Checks probabilities, shapes and column sums against the site count.
    pub fn validate(&self, sites: usize) -> Result<(), QseError> {
        match self {
            NoiseDescriptor::Uniform(confusion) => confusion.validate(None),
            NoiseDescriptor::PerSite(entries) => {
                if entries.len() != sites {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("noise-site-mismatch", "one confusion entry per site required")
                            .with_context("expected", sites)
                            .with_context("actual", entries.len()),
                    ));
                }
                entries
                    .iter()
                    .enumerate()
                    .try_for_each(|(site, confusion)| confusion.validate(Some(site)))
            }
            NoiseDescriptor::Joint {
                sites: joint_sites,
                matrix,
            } => {
                if *joint_sites != sites {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("noise-site-mismatch", "joint matrix must cover every site")
                            .with_context("expected", sites)
                            .with_context("actual", joint_sites),
                    ));
                }
                let dim = u32::try_from(sites)
                    .ok()
                    .and_then(|shift| 1usize.checked_shl(shift))
                    .ok_or_else(|| {
                        QseError::Configuration(
                            ErrorInfo::new("noise-matrix-too-large", "joint matrix dimension overflows")
                                .with_context("sites", sites),
                        )
                    })?;
                if matrix.len() != dim || matrix.iter().any(|row| row.len() != dim) {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("noise-matrix-shape", "joint matrix must be square of size 2^sites")
                            .with_context("dimension", dim),
                    ));
                }
                for column in 0..dim {
                    let total: f64 = matrix.iter().map(|row| row[column]).sum();
                    if (total - 1.0).abs() > 1e-6 || matrix.iter().any(|row| row[column] < 0.0) {
                        return Err(QseError::Configuration(
                            ErrorInfo::new("noise-matrix-not-stochastic", "columns must be probability vectors")
                                .with_context("column", column)
                                .with_context("sum", total),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}
