//! Protocol selection and run configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, NoiseDescriptor, ObservableSet, QseError};
use qse_est::{validate_confidence_level, EstimatorConfig};

/// Closed set of measurement strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// One setting per observable, equal shots.
    DirectNaive,
    /// Greedy commutation groups, equal shots.
    DirectGrouped,
    /// Greedy commutation groups, shots proportional to the largest squared coefficient.
    DirectOptimized,
    /// Uniformly random local bases per shot.
    Shadow,
    /// Random local bases with readout correction.
    ShadowNoiseAware,
    /// Grouped rounds reallocating towards high-variance groups.
    AdaptiveGrouped,
    /// Randomized rounds with the adaptive stopping rule.
    AdaptiveShadow,
}

impl ProtocolKind {
    /// Every protocol kind, in declaration order.
    pub const ALL: [ProtocolKind; 7] = [
        ProtocolKind::DirectNaive,
        ProtocolKind::DirectGrouped,
        ProtocolKind::DirectOptimized,
        ProtocolKind::Shadow,
        ProtocolKind::ShadowNoiseAware,
        ProtocolKind::AdaptiveGrouped,
        ProtocolKind::AdaptiveShadow,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::DirectNaive => "direct_naive",
            ProtocolKind::DirectGrouped => "direct_grouped",
            ProtocolKind::DirectOptimized => "direct_optimized",
            ProtocolKind::Shadow => "shadow",
            ProtocolKind::ShadowNoiseAware => "shadow_noise_aware",
            ProtocolKind::AdaptiveGrouped => "adaptive_grouped",
            ProtocolKind::AdaptiveShadow => "adaptive_shadow",
        }
    }

    /// True for multi-round protocols.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, ProtocolKind::AdaptiveGrouped | ProtocolKind::AdaptiveShadow)
    }

    /// True for randomized-basis protocols.
    pub fn is_randomized(&self) -> bool {
        matches!(
            self,
            ProtocolKind::Shadow | ProtocolKind::ShadowNoiseAware | ProtocolKind::AdaptiveShadow
        )
    }

    /// True when a supplied noise descriptor is used for correction.
    pub fn corrects_readout(&self) -> bool {
        matches!(
            self,
            ProtocolKind::DirectNaive
                | ProtocolKind::DirectGrouped
                | ProtocolKind::DirectOptimized
                | ProtocolKind::ShadowNoiseAware
                | ProtocolKind::AdaptiveGrouped
        )
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = QseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ProtocolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| {
                QseError::Configuration(
                    ErrorInfo::new("unknown-protocol", "unrecognised protocol name")
                        .with_context("name", raw),
                )
            })
    }
}

/// Round control for adaptive protocols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Upper bound on acquisition rounds.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Share of the budget spent in the pilot round.
    #[serde(default = "default_pilot_fraction")]
    pub pilot_fraction: f64,
    /// Stop early once every half-width is at or below this value.
    #[serde(default)]
    pub early_stop_half_width: Option<f64>,
}

fn default_max_rounds() -> usize {
    4
}

fn default_pilot_fraction() -> f64 {
    0.1
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            pilot_fraction: default_pilot_fraction(),
            early_stop_half_width: None,
        }
    }
}

/// Configuration of a single protocol run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Total shot budget.
    pub total_shots: u64,
    /// Confidence level of the reported intervals.
    pub confidence_level: f64,
    /// Estimator and interval settings.
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Round control for adaptive protocols.
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

impl ProtocolConfig {
    /// Configuration with default estimator and adaptive settings.
    pub fn new(total_shots: u64, confidence_level: f64) -> Self {
        Self {
            total_shots,
            confidence_level,
            estimator: EstimatorConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }

    /// Fails fast on any setting that would make acquisition pointless.
    pub fn validate(&self) -> Result<(), QseError> {
        if self.total_shots == 0 {
            return Err(QseError::config("non-positive-budget", "shot budget must be positive"));
        }
        validate_confidence_level(self.confidence_level)?;
        self.estimator.validate()?;
        let adaptive = &self.adaptive;
        if adaptive.max_rounds == 0 {
            return Err(QseError::config("invalid-max-rounds", "at least one round is required"));
        }
        if !(adaptive.pilot_fraction > 0.0 && adaptive.pilot_fraction <= 1.0) {
            return Err(QseError::Configuration(
                ErrorInfo::new("invalid-pilot-fraction", "pilot fraction must lie in (0, 1]")
                    .with_context("pilot_fraction", adaptive.pilot_fraction),
            ));
        }
        if let Some(target) = adaptive.early_stop_half_width {
            if !(target.is_finite() && target > 0.0) {
                return Err(QseError::Configuration(
                    ErrorInfo::new("invalid-epsilon", "early-stop half-width must be positive")
                        .with_context("early_stop_half_width", target),
                ));
            }
        }
        Ok(())
    }
}

/// Caller-supplied context passed explicitly into every protocol instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolContext {
    /// Readout noise description; `None` disables correction.
    pub noise: Option<NoiseDescriptor>,
}

impl ProtocolContext {
    /// Context with a noise descriptor.
    pub fn with_noise(noise: NoiseDescriptor) -> Self {
        Self { noise: Some(noise) }
    }

    pub(crate) fn validate(&self, observables: &ObservableSet) -> Result<(), QseError> {
        match &self.noise {
            Some(noise) => noise.validate(observables.num_sites()),
            None => Ok(()),
        }
    }
}
