//! Family-wise error control for simultaneous interval claims.
//!
//! Every simultaneous request names its method and `delta` explicitly; there
//! is no default. Asking for uncorrected intervals is allowed but logged,
//! since it makes a per-observable claim look simultaneous.

use log::warn;
use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, QseError};

use crate::estimate::Estimates;
use crate::interval::ConfidenceInterval;

/// Correction applied when a claim covers every observable at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FwerMethod {
    /// `alpha_i = delta / M`.
    Bonferroni,
    /// `alpha_i = 1 - (1 - delta)^(1/M)`.
    Sidak,
    /// Holm step-down. Interval claims test no hypothesis, so nothing is
    /// rejected and every observable stays at `delta / M`.
    Holm,
    /// `alpha_i = delta`; no family-wise guarantee.
    Uncorrected,
}

/// Explicit method and global failure probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FwerSpec {
    /// Correction method.
    pub method: FwerMethod,
    /// Global failure probability in `(0, 1)`.
    pub delta: f64,
}

impl FwerSpec {
    /// Creates a validated specification.
    pub fn new(method: FwerMethod, delta: f64) -> Result<Self, QseError> {
        let spec = Self { method, delta };
        spec.validate()?;
        Ok(spec)
    }

    /// Rejects `delta` outside `(0, 1)`.
    pub fn validate(&self) -> Result<(), QseError> {
        if self.delta > 0.0 && self.delta < 1.0 {
            Ok(())
        } else {
            Err(QseError::Configuration(
                ErrorInfo::new("invalid-delta", "global failure probability must lie in (0, 1)")
                    .with_context("delta", self.delta),
            ))
        }
    }

    /// Per-observable significance levels for `m` observables.
    ///
    /// The levels of one family always sum to at most `delta`, except for
    /// `Uncorrected`.
    pub fn alphas(&self, m: usize) -> Vec<f64> {
        if m == 0 {
            return Vec::new();
        }
        let mf = m as f64;
        match self.method {
            FwerMethod::Bonferroni | FwerMethod::Holm => vec![self.delta / mf; m],
            FwerMethod::Sidak => vec![1.0 - (1.0 - self.delta).powf(1.0 / mf); m],
            FwerMethod::Uncorrected => vec![self.delta; m],
        }
    }
}

/// Simultaneous intervals for every observable of one [`Estimates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimultaneousIntervals {
    /// Specification used.
    pub spec: FwerSpec,
    /// Per-observable significance levels, in reporting order.
    pub alphas: Vec<f64>,
    /// Per-observable intervals, in reporting order.
    pub intervals: Vec<ConfidenceInterval>,
}

impl SimultaneousIntervals {
    /// Raw half-widths in reporting order.
    pub fn half_widths(&self) -> Vec<f64> {
        self.intervals.iter().map(ConfidenceInterval::half_width).collect()
    }

    /// Largest raw half-width.
    pub fn max_half_width(&self) -> f64 {
        self.intervals
            .iter()
            .map(ConfidenceInterval::half_width)
            .fold(0.0, f64::max)
    }

    /// True when every interval contains the matching value.
    pub fn all_contain(&self, truths: &[f64]) -> bool {
        self.intervals
            .iter()
            .zip(truths)
            .all(|(interval, &truth)| interval.contains(truth))
    }
}

/// Rebuilds every interval of `estimates` at its corrected level.
pub fn simultaneous_intervals(
    estimates: &Estimates,
    spec: &FwerSpec,
) -> Result<SimultaneousIntervals, QseError> {
    spec.validate()?;
    if estimates.is_empty() {
        return Err(QseError::config(
            "empty-estimates",
            "simultaneous intervals need at least one observable",
        ));
    }
    if spec.method == FwerMethod::Uncorrected {
        warn!(
            "simultaneous claim over {} observables uses uncorrected per-observable intervals",
            estimates.len()
        );
    }
    let alphas = spec.alphas(estimates.len());
    let intervals = estimates
        .iter()
        .zip(&alphas)
        .map(|(entry, &alpha)| entry.interval_at(alpha))
        .collect();
    Ok(SimultaneousIntervals {
        spec: *spec,
        alphas,
        intervals,
    })
}
