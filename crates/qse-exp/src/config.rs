//! Sweep configuration and its loaders.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use qse_bench::{validate_epsilon, ShotGrid};
use qse_core::{ErrorInfo, NoiseDescriptor, ObservableSet, QseError};
use qse_est::{validate_confidence_level, EstimatorConfig, FwerSpec};
use qse_proto::{AdaptiveConfig, ProtocolConfig, ProtocolContext, ProtocolKind};

use crate::hash::stable_hash_string;
use crate::serde::{from_json_slice, from_yaml_slice};

/// Worker pool settings for triple execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    /// Number of worker threads; results do not depend on it.
    #[serde(default = "Scheduler::default_parallelism")]
    pub parallelism: usize,
}

impl Scheduler {
    const fn default_parallelism() -> usize {
        1
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            parallelism: Self::default_parallelism(),
        }
    }
}

/// Everything a sweep needs besides the backend and the truth source.
///
/// The observable set, protocol list, grid, replicate count, seed and
/// confidence level have no defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Observables estimated in every triple.
    pub observables: ObservableSet,
    /// Protocols compared, in output order.
    pub protocols: Vec<ProtocolKind>,
    /// Shot budgets shared by every protocol.
    pub grid: ShotGrid,
    /// Independent replicates per (protocol, budget).
    pub replicates: usize,
    /// Master seed.
    pub seed: u64,
    /// Per-observable confidence level of the reported intervals.
    pub confidence_level: f64,
    /// Estimator and interval settings.
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Round control for adaptive protocols.
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    /// Readout noise handed to correcting protocols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<NoiseDescriptor>,
    /// Simultaneous-interval specification for the N* summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwer: Option<FwerSpec>,
    /// Accuracy target for the N* summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    /// Wall-clock limit per triple in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<f64>,
    /// Worker pool settings.
    #[serde(default)]
    pub scheduler: Scheduler,
}

impl SweepConfig {
    /// Configuration with default estimator, adaptive and scheduler settings.
    pub fn new(
        observables: ObservableSet,
        protocols: Vec<ProtocolKind>,
        grid: ShotGrid,
        replicates: usize,
        seed: u64,
        confidence_level: f64,
    ) -> Self {
        Self {
            observables,
            protocols,
            grid,
            replicates,
            seed,
            confidence_level,
            estimator: EstimatorConfig::default(),
            adaptive: AdaptiveConfig::default(),
            noise: None,
            fwer: None,
            epsilon: None,
            deadline_seconds: None,
            scheduler: Scheduler::default(),
        }
    }

    /// Rejects anything that would fail every triple, before work starts.
    pub fn validate(&self) -> Result<(), QseError> {
        if self.observables.is_empty() {
            return Err(QseError::config(
                "empty-observable-set",
                "observable set must contain at least one observable",
            ));
        }
        if self.protocols.is_empty() {
            return Err(QseError::config("empty-protocols", "at least one protocol is required"));
        }
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.protocols.iter().find(|kind| !seen.insert(**kind)) {
            return Err(QseError::Configuration(
                ErrorInfo::new("duplicate-protocol", "each protocol may appear once")
                    .with_context("protocol", duplicate),
            ));
        }
        if self.replicates == 0 {
            return Err(QseError::config("zero-replicates", "at least one replicate is required"));
        }
        self.grid.validate()?;
        validate_confidence_level(self.confidence_level)?;
        self.protocol_config(1).validate()?;
        if let Some(noise) = &self.noise {
            noise.validate(self.observables.num_sites())?;
        }
        if let Some(fwer) = &self.fwer {
            fwer.validate()?;
        }
        if let Some(epsilon) = self.epsilon {
            validate_epsilon(epsilon)?;
        }
        if let Some(seconds) = self.deadline_seconds {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(QseError::Configuration(
                    ErrorInfo::new("invalid-deadline", "deadline must be a positive number of seconds")
                        .with_context("deadline_seconds", seconds),
                ));
            }
        }
        if self.scheduler.parallelism == 0 {
            return Err(QseError::config(
                "invalid-parallelism",
                "scheduler needs at least one worker",
            ));
        }
        Ok(())
    }

    /// Stable hash of everything that can change the results.
    ///
    /// Scheduler settings are excluded since output does not depend on them.
    pub fn config_hash(&self) -> Result<String, QseError> {
        let mut hashed = self.clone();
        hashed.scheduler = Scheduler::default();
        stable_hash_string(&hashed)
    }

    /// Per-triple protocol configuration at budget `total_shots`.
    pub fn protocol_config(&self, total_shots: u64) -> ProtocolConfig {
        ProtocolConfig {
            total_shots,
            confidence_level: self.confidence_level,
            estimator: self.estimator.clone(),
            adaptive: self.adaptive.clone(),
        }
    }

    /// Context shared by every protocol instance.
    pub fn protocol_context(&self) -> ProtocolContext {
        ProtocolContext {
            noise: self.noise.clone(),
        }
    }
}

/// Loads a sweep configuration from a `.yaml`, `.yml` or `.json` file.
///
/// The result is validated before it is returned.
pub fn load_sweep_config(path: &Path) -> Result<SweepConfig, QseError> {
    let data = fs::read(path).map_err(|err| {
        QseError::Configuration(
            ErrorInfo::new("config-read", err.to_string()).with_context("path", path.display()),
        )
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let config: SweepConfig = match extension.as_deref() {
        Some("yaml") | Some("yml") => from_yaml_slice(&data)?,
        Some("json") => from_json_slice(&data)?,
        _ => {
            return Err(QseError::Configuration(
                ErrorInfo::new("unsupported-config-format", "expected a .yaml, .yml or .json file")
                    .with_context("path", path.display()),
            ))
        }
    };
    config.validate()?;
    Ok(config)
}
