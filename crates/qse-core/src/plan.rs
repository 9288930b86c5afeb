//! Measurement settings and shot-allocated measurement plans.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QseError};
use crate::observable::{ObservableSet, Pauli};

fn plan_error(code: &str, message: impl Into<String>) -> QseError {
    QseError::Configuration(ErrorInfo::new(code, message.into()))
}

/// Per-site measurement basis assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementSetting {
    /// One basis per site reused for every shot. Identity sites are read out in Z.
    Fixed {
        /// Basis per site.
        bases: Vec<Pauli>,
    },
    /// Every shot draws its own local bases; the realized choice travels with the data.
    Randomized {
        /// Number of sites.
        sites: usize,
    },
}

impl MeasurementSetting {
    /// Number of sites covered by the setting.
    pub fn num_sites(&self) -> usize {
        match self {
            MeasurementSetting::Fixed { bases } => bases.len(),
            MeasurementSetting::Randomized { sites } => *sites,
        }
    }

    /// Returns true for the randomized marker.
    pub fn is_randomized(&self) -> bool {
        matches!(self, MeasurementSetting::Randomized { .. })
    }

    /// Fixed bases, if any.
    pub fn fixed_bases(&self) -> Option<&[Pauli]> {
        match self {
            MeasurementSetting::Fixed { bases } => Some(bases),
            MeasurementSetting::Randomized { .. } => None,
        }
    }

    /// Short label such as `"XXZI"` or `"random[4]"`.
    pub fn label(&self) -> String {
        match self {
            MeasurementSetting::Fixed { bases } => bases.iter().map(|p| p.as_char()).collect(),
            MeasurementSetting::Randomized { sites } => format!("random[{sites}]"),
        }
    }
}

/// One `(setting, shots)` pair together with the observables it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Setting to execute.
    pub setting: MeasurementSetting,
    /// Requested shot count.
    pub shots: u64,
    /// Reporting indices of the observables estimable from this setting.
    pub observables: Vec<usize>,
    /// Pre-drawn per-shot bases for randomized settings (empty for fixed ones).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<Vec<Pauli>>,
}

impl PlanEntry {
    /// Creates a fixed-setting entry.
    pub fn fixed(bases: Vec<Pauli>, shots: u64, observables: Vec<usize>) -> Self {
        Self {
            setting: MeasurementSetting::Fixed { bases },
            shots,
            observables,
            schedule: Vec::new(),
        }
    }

    /// Creates a randomized entry whose per-shot bases were drawn by the protocol.
    pub fn randomized(sites: usize, schedule: Vec<Vec<Pauli>>, observables: Vec<usize>) -> Self {
        Self {
            setting: MeasurementSetting::Randomized { sites },
            shots: schedule.len() as u64,
            observables,
            schedule,
        }
    }
}

/// Ordered list of plan entries covering an observable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPlan {
    entries: Vec<PlanEntry>,
}

impl MeasurementPlan {
    /// Validates the entries against `observables` and builds the plan.
    ///
    /// Every observable must be listed by at least one entry, listed
    /// observables must be measurable in fixed settings, and randomized
    /// schedules must match the requested shot count.
    pub fn new(entries: Vec<PlanEntry>, observables: &ObservableSet) -> Result<Self, QseError> {
        if entries.is_empty() {
            return Err(plan_error("empty-plan", "plan must contain at least one setting"));
        }
        let sites = observables.num_sites();
        let mut covered = BTreeSet::new();
        for (entry_idx, entry) in entries.iter().enumerate() {
            if entry.setting.num_sites() != sites {
                return Err(QseError::Configuration(
                    ErrorInfo::new("setting-site-mismatch", "setting site count differs")
                        .with_context("entry", entry_idx)
                        .with_context("expected", sites)
                        .with_context("actual", entry.setting.num_sites()),
                ));
            }
            for &obs_idx in &entry.observables {
                let observable = observables.get(obs_idx).ok_or_else(|| {
                    QseError::Configuration(
                        ErrorInfo::new("unknown-observable", "plan references a missing observable")
                            .with_context("entry", entry_idx)
                            .with_context("index", obs_idx),
                    )
                })?;
                if let Some(bases) = entry.setting.fixed_bases() {
                    if !observable.is_measurable_in(bases) {
                        return Err(QseError::Configuration(
                            ErrorInfo::new("incompatible-observable", "observable not measurable in setting")
                                .with_context("entry", entry_idx)
                                .with_context("observable", observable.id())
                                .with_context("setting", entry.setting.label()),
                        ));
                    }
                }
                covered.insert(obs_idx);
            }
            if entry.setting.is_randomized() {
                if entry.schedule.len() as u64 != entry.shots {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("schedule-length-mismatch", "randomized schedule must list one basis row per shot")
                            .with_context("entry", entry_idx)
                            .with_context("shots", entry.shots)
                            .with_context("schedule", entry.schedule.len()),
                    ));
                }
                if let Some(row) = entry
                    .schedule
                    .iter()
                    .find(|row| row.len() != sites || row.iter().any(|p| p.is_identity()))
                {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("invalid-schedule-row", "schedule rows need one non-identity basis per site")
                            .with_context("entry", entry_idx)
                            .with_context("row_len", row.len()),
                    ));
                }
            }
        }
        if let Some(missing) = (0..observables.len()).find(|idx| !covered.contains(idx)) {
            return Err(QseError::Configuration(
                ErrorInfo::new("uncovered-observable", "every observable must be covered by a setting")
                    .with_context("observable", missing),
            ));
        }
        Ok(Self { entries })
    }

    /// Plan entries in execution order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Number of settings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a validated plan.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of requested shots.
    pub fn total_shots(&self) -> u64 {
        self.entries.iter().map(|entry| entry.shots).sum()
    }

    /// Replaces fixed-setting shot counts; randomized entries keep their schedule length.
    pub fn with_allocation(mut self, shots: &[u64]) -> Result<Self, QseError> {
        if shots.len() != self.entries.len() {
            return Err(QseError::Configuration(
                ErrorInfo::new("allocation-length-mismatch", "one shot count per setting required")
                    .with_context("settings", self.entries.len())
                    .with_context("allocation", shots.len()),
            ));
        }
        for (entry, &count) in self.entries.iter_mut().zip(shots) {
            if entry.setting.is_randomized() && count != entry.shots {
                return Err(plan_error(
                    "randomized-allocation",
                    "randomized entries are sized by their schedule",
                ));
            }
            entry.shots = count;
        }
        Ok(self)
    }
}
