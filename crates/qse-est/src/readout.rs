//! Inversion of readout confusion channels.
//!
//! Correction replaces the per-site parity sign by an unbiased weight built
//! from the inverse confusion matrix, so averaging corrected weights over
//! noisy outcomes recovers the noise-free expectation. Ill-conditioned or
//! singular matrices are pseudo-inverted and flagged rather than rejected.

use log::warn;
use nalgebra::DMatrix;
use qse_core::{Bitstring, ErrorInfo, NoiseDescriptor, QseError};

#[derive(Debug, Clone)]
enum Correction {
    PerSite {
        weights: Vec<[f64; 2]>,
        fallback: Vec<bool>,
    },
    Joint {
        inverse: DMatrix<f64>,
        fallback: bool,
    },
}

/// Inverted readout channel ready to produce parity weights.
#[derive(Debug, Clone)]
pub struct ReadoutCorrection {
    sites: usize,
    correction: Correction,
}

/// Per-outcome weight replacing the parity sign of one observable support.
#[derive(Debug, Clone, PartialEq)]
pub enum ParityWeights {
    /// Plain signs `(-1)^(parity)` over the support.
    Sign {
        /// Support sites.
        support: Vec<usize>,
    },
    /// Product of per-site corrected weights `g_site(bit)`.
    PerSite {
        /// Support sites.
        support: Vec<usize>,
        /// `[g(0), g(1)]` for each support site, in support order.
        weights: Vec<[f64; 2]>,
    },
    /// Weight indexed by the little-endian outcome index.
    Table(Vec<f64>),
}

impl ParityWeights {
    /// Uncorrected signs over `support`.
    pub fn ideal(support: Vec<usize>) -> Self {
        ParityWeights::Sign { support }
    }

    /// Weight of one measured outcome.
    pub fn weight(&self, outcome: &Bitstring) -> f64 {
        match self {
            ParityWeights::Sign { support } => outcome.parity_sign(support),
            ParityWeights::PerSite { support, weights } => support
                .iter()
                .zip(weights)
                .map(|(&site, g)| g[usize::from(outcome.bit(site))])
                .product(),
            ParityWeights::Table(table) => table[outcome.index()],
        }
    }
}

impl ReadoutCorrection {
    /// Inverts `noise` for a system of `sites` sites.
    pub fn new(noise: &NoiseDescriptor, sites: usize, max_condition: f64) -> Result<Self, QseError> {
        noise.validate(sites)?;
        let correction = match noise {
            NoiseDescriptor::Joint { matrix, .. } => {
                let dim = matrix.len();
                let dense = DMatrix::from_fn(dim, dim, |r, c| matrix[r][c]);
                let (inverse, fallback) = invert(dense, max_condition)?;
                if fallback {
                    warn!("joint readout matrix is ill-conditioned; using pseudo-inverse");
                }
                Correction::Joint { inverse, fallback }
            }
            _ => {
                let mut weights = Vec::with_capacity(sites);
                let mut fallback = Vec::with_capacity(sites);
                for site in 0..sites {
                    let confusion = noise.site(site).ok_or_else(|| {
                        QseError::Configuration(
                            ErrorInfo::new("noise-site-mismatch", "missing confusion entry")
                                .with_context("site", site),
                        )
                    })?;
                    let a = confusion.matrix();
                    let dense = DMatrix::from_fn(2, 2, |r, c| a[r][c]);
                    let (inverse, site_fallback) = invert(dense, max_condition)?;
                    if site_fallback {
                        warn!("readout confusion on site {site} is ill-conditioned; using pseudo-inverse");
                    }
                    weights.push([
                        inverse[(0, 0)] - inverse[(1, 0)],
                        inverse[(0, 1)] - inverse[(1, 1)],
                    ]);
                    fallback.push(site_fallback);
                }
                Correction::PerSite { weights, fallback }
            }
        };
        Ok(Self { sites, correction })
    }

    /// Number of sites covered.
    pub fn sites(&self) -> usize {
        self.sites
    }

    /// Corrected weights for an observable supported on `support`.
    pub fn parity_weights(&self, support: &[usize]) -> ParityWeights {
        match &self.correction {
            Correction::PerSite { weights, .. } => ParityWeights::PerSite {
                support: support.to_vec(),
                weights: support.iter().map(|&site| weights[site]).collect(),
            },
            Correction::Joint { inverse, .. } => {
                let dim = inverse.nrows();
                let table = (0..dim)
                    .map(|measured| {
                        (0..dim)
                            .map(|truth| {
                                let sign = Bitstring::from_index(truth, self.sites).parity_sign(support);
                                inverse[(truth, measured)] * sign
                            })
                            .sum()
                    })
                    .collect();
                ParityWeights::Table(table)
            }
        }
    }

    /// True when any matrix touching `support` needed the pseudo-inverse.
    pub fn touches_fallback(&self, support: &[usize]) -> bool {
        match &self.correction {
            Correction::PerSite { fallback, .. } => support.iter().any(|&site| fallback[site]),
            Correction::Joint { fallback, .. } => *fallback,
        }
    }
}

/// Inverts `matrix`, falling back to the SVD pseudo-inverse when it is
/// singular or its condition number exceeds `max_condition`.
fn invert(matrix: DMatrix<f64>, max_condition: f64) -> Result<(DMatrix<f64>, bool), QseError> {
    let svd = matrix.clone().svd(true, true);
    let largest = svd.singular_values.max();
    let smallest = svd.singular_values.min();
    let condition = if smallest > 0.0 { largest / smallest } else { f64::INFINITY };
    if condition <= max_condition {
        if let Some(inverse) = matrix.try_inverse() {
            return Ok((inverse, false));
        }
    }
    let eps = largest * f64::EPSILON * svd.singular_values.len() as f64;
    let inverse = svd.pseudo_inverse(eps).map_err(|reason| {
        QseError::Numerical(
            ErrorInfo::new("pseudo-inverse-failed", reason).with_context("condition", condition),
        )
    })?;
    Ok((inverse, true))
}
