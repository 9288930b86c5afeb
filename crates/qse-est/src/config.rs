//! Estimator and interval-construction settings.

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, QseError};

use crate::interval::IntervalMethod;
use crate::robust::BlockPolicy;

/// Settings controlling reconstruction, blocking and interval construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Minimum effective sample size for the normal approximation.
    #[serde(default = "default_ess_threshold")]
    pub ess_threshold: usize,
    /// Bootstrap replicate count.
    #[serde(default = "default_bootstrap_replicates")]
    pub bootstrap_replicates: usize,
    /// Kurtosis ratio at or above which the sample counts as heavy-tailed.
    #[serde(default = "default_tail_threshold")]
    pub tail_threshold: f64,
    /// Median-of-means block policy.
    #[serde(default)]
    pub blocks: BlockPolicy,
    /// Resample block means instead of shots when more than one block is used.
    #[serde(default)]
    pub block_bootstrap: bool,
    /// Forces an interval method instead of automatic selection.
    #[serde(default)]
    pub method: Option<IntervalMethod>,
    /// Condition number above which readout matrices are pseudo-inverted.
    #[serde(default = "default_max_condition")]
    pub max_condition: f64,
}

fn default_ess_threshold() -> usize {
    100
}

fn default_bootstrap_replicates() -> usize {
    1000
}

fn default_tail_threshold() -> f64 {
    4.0
}

fn default_max_condition() -> f64 {
    1e8
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            ess_threshold: default_ess_threshold(),
            bootstrap_replicates: default_bootstrap_replicates(),
            tail_threshold: default_tail_threshold(),
            blocks: BlockPolicy::default(),
            block_bootstrap: false,
            method: None,
            max_condition: default_max_condition(),
        }
    }
}

impl EstimatorConfig {
    /// Rejects settings that cannot produce an interval.
    pub fn validate(&self) -> Result<(), QseError> {
        if self.bootstrap_replicates == 0 {
            return Err(QseError::config(
                "invalid-bootstrap-replicates",
                "bootstrap replicate count must be positive",
            ));
        }
        if !(self.tail_threshold.is_finite() && self.tail_threshold > 0.0) {
            return Err(QseError::Configuration(
                ErrorInfo::new("invalid-tail-threshold", "tail threshold must be positive")
                    .with_context("tail_threshold", self.tail_threshold),
            ));
        }
        if matches!(self.blocks, BlockPolicy::Fixed(0)) {
            return Err(QseError::config("invalid-block-count", "block count must be at least 1"));
        }
        if self.method == Some(IntervalMethod::FullRange) {
            return Err(QseError::config(
                "invalid-interval-method",
                "full_range is reserved for observables without data",
            ));
        }
        if !(self.max_condition >= 1.0) {
            return Err(QseError::Configuration(
                ErrorInfo::new("invalid-max-condition", "condition limit must be at least 1")
                    .with_context("max_condition", self.max_condition),
            ));
        }
        Ok(())
    }
}

/// Checks that a confidence level lies strictly between 0 and 1.
pub fn validate_confidence_level(level: f64) -> Result<(), QseError> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(QseError::Configuration(
            ErrorInfo::new("invalid-confidence-level", "confidence level must lie in (0, 1)")
                .with_context("confidence_level", level),
        ))
    }
}
