//! Raw acquisition results returned by an execution backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QseError};
use crate::observable::Pauli;
use crate::plan::{MeasurementPlan, MeasurementSetting};

/// Measured bit outcomes; position `i` holds site `i`, `false` is the +1 eigenvalue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitstring(Vec<bool>);

impl Bitstring {
    /// Wraps a bit vector.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Builds the bitstring of the little-endian basis index `index` over `sites` sites.
    pub fn from_index(index: usize, sites: usize) -> Self {
        Self((0..sites).map(|site| (index >> site) & 1 == 1).collect())
    }

    /// Little-endian basis index (site 0 is the least significant bit).
    pub fn index(&self) -> usize {
        self.0
            .iter()
            .enumerate()
            .fold(0usize, |acc, (site, &bit)| acc | (usize::from(bit) << site))
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-site outcome.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit measured on `site`.
    pub fn bit(&self, site: usize) -> bool {
        self.0[site]
    }

    /// Bits as a slice.
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Parity sign `(-1)^(sum of bits on sites)`.
    pub fn parity_sign(&self, sites: &[usize]) -> f64 {
        let odd = sites.iter().filter(|&&site| self.0[site]).count() % 2 == 1;
        if odd {
            -1.0
        } else {
            1.0
        }
    }
}

impl fmt::Display for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Bitstring {
    type Err = QseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.chars()
            .map(|ch| match ch {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(QseError::Backend(
                    ErrorInfo::new("invalid-bitstring", "outcome strings contain only 0 and 1")
                        .with_context("char", other),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Bitstring)
    }
}

impl TryFrom<String> for Bitstring {
    type Error = QseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bitstring> for String {
    fn from(value: Bitstring) -> Self {
        value.to_string()
    }
}

/// Completion status reported by the backend for one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// All requested shots completed.
    Success,
    /// Fewer shots than requested; the data present is still valid.
    Partial,
    /// Nothing usable was acquired.
    Failed,
}

/// One randomized shot: the realized local bases and the measured outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomizedShot {
    /// Basis measured on each site.
    pub bases: Vec<Pauli>,
    /// Outcome bits.
    pub outcome: Bitstring,
}

/// Data acquired for one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDatasetChunk {
    /// Index of the plan entry this chunk answers.
    pub entry: usize,
    /// Setting that was executed.
    pub setting: MeasurementSetting,
    /// Outcome histogram.
    pub counts: BTreeMap<Bitstring, u64>,
    /// Per-shot bases and outcomes, present for randomized settings only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shots: Vec<RandomizedShot>,
    /// Shots the plan asked for.
    pub requested_shots: u64,
    /// Shots actually completed.
    pub completed_shots: u64,
    /// Backend-reported status.
    pub status: ChunkStatus,
    /// Backend failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RawDatasetChunk {
    /// Builds a fixed-setting chunk from an outcome histogram.
    pub fn from_counts(
        entry: usize,
        setting: MeasurementSetting,
        counts: BTreeMap<Bitstring, u64>,
        requested_shots: u64,
    ) -> Self {
        let completed_shots = counts.values().sum();
        Self {
            entry,
            setting,
            counts,
            shots: Vec::new(),
            requested_shots,
            completed_shots,
            status: status_for(requested_shots, completed_shots),
            failure: None,
        }
    }

    /// Builds a randomized chunk from per-shot records; the histogram is derived.
    pub fn from_randomized(
        entry: usize,
        sites: usize,
        shots: Vec<RandomizedShot>,
        requested_shots: u64,
    ) -> Self {
        let mut counts = BTreeMap::new();
        for shot in &shots {
            *counts.entry(shot.outcome.clone()).or_insert(0) += 1;
        }
        let completed_shots = shots.len() as u64;
        Self {
            entry,
            setting: MeasurementSetting::Randomized { sites },
            counts,
            shots,
            requested_shots,
            completed_shots,
            status: status_for(requested_shots, completed_shots),
            failure: None,
        }
    }

    /// Builds an empty failed chunk.
    pub fn failed(
        entry: usize,
        setting: MeasurementSetting,
        requested_shots: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entry,
            setting,
            counts: BTreeMap::new(),
            shots: Vec::new(),
            requested_shots,
            completed_shots: 0,
            status: ChunkStatus::Failed,
            failure: Some(reason.into()),
        }
    }

    /// Status after reconciling the reported status with the shot counts.
    ///
    /// A shortfall is never reported as success.
    pub fn effective_status(&self) -> ChunkStatus {
        match self.status {
            ChunkStatus::Success if self.completed_shots < self.requested_shots => {
                if self.completed_shots == 0 {
                    ChunkStatus::Failed
                } else {
                    ChunkStatus::Partial
                }
            }
            other => other,
        }
    }

    /// Checks the chunk against the plan that produced it.
    pub fn validate(&self, plan: &MeasurementPlan) -> Result<(), QseError> {
        let entry = plan.entries().get(self.entry).ok_or_else(|| {
            QseError::Backend(
                ErrorInfo::new("unknown-plan-entry", "chunk refers to a missing plan entry")
                    .with_context("entry", self.entry),
            )
        })?;
        if entry.setting != self.setting {
            return Err(QseError::Backend(
                ErrorInfo::new("setting-mismatch", "chunk setting differs from plan")
                    .with_context("entry", self.entry)
                    .with_context("expected", entry.setting.label())
                    .with_context("actual", self.setting.label()),
            ));
        }
        let histogram_total: u64 = self.counts.values().sum();
        if histogram_total != self.completed_shots {
            return Err(QseError::Backend(
                ErrorInfo::new("count-mismatch", "histogram total differs from completed shots")
                    .with_context("entry", self.entry)
                    .with_context("histogram", histogram_total)
                    .with_context("completed", self.completed_shots),
            ));
        }
        if self.completed_shots > self.requested_shots {
            return Err(QseError::Backend(
                ErrorInfo::new("excess-shots", "backend returned more shots than requested")
                    .with_context("entry", self.entry)
                    .with_context("requested", self.requested_shots)
                    .with_context("completed", self.completed_shots),
            ));
        }
        let sites = self.setting.num_sites();
        if let Some(bad) = self.counts.keys().find(|outcome| outcome.len() != sites) {
            return Err(QseError::Backend(
                ErrorInfo::new("outcome-width", "outcome width differs from site count")
                    .with_context("entry", self.entry)
                    .with_context("outcome", bad),
            ));
        }
        if self.setting.is_randomized() && self.shots.len() as u64 != self.completed_shots {
            return Err(QseError::Backend(
                ErrorInfo::new("missing-basis-record", "randomized chunks need per-shot basis records")
                    .with_context("entry", self.entry)
                    .with_context("records", self.shots.len())
                    .with_context("completed", self.completed_shots),
            ));
        }
        for (shot_index, shot) in self.shots.iter().enumerate() {
            if shot.bases.len() != sites
                || shot.outcome.len() != sites
                || shot.bases.contains(&Pauli::I)
            {
                return Err(QseError::Backend(
                    ErrorInfo::new(
                        "malformed-basis-record",
                        "randomized shots need one non-identity basis and one bit per site",
                    )
                    .with_context("entry", self.entry)
                    .with_context("shot", shot_index)
                    .with_context("bases", shot.bases.len())
                    .with_context("outcome", &shot.outcome),
                ));
            }
            // Backends answer a schedule in order, so the records form its prefix.
            if let Some(expected) = entry.schedule.get(shot_index) {
                if *expected != shot.bases {
                    return Err(QseError::Backend(
                        ErrorInfo::new("schedule-mismatch", "measured bases differ from the issued schedule")
                            .with_context("entry", self.entry)
                            .with_context("shot", shot_index),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn status_for(requested: u64, completed: u64) -> ChunkStatus {
    if completed >= requested {
        ChunkStatus::Success
    } else if completed == 0 {
        ChunkStatus::Failed
    } else {
        ChunkStatus::Partial
    }
}
