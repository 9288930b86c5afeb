//! Narrow interfaces to the external collaborators: execution and ground truth.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chunk::RawDatasetChunk;
use crate::errors::QseError;
use crate::observable::{Observable, ObservableId};
use crate::plan::MeasurementPlan;

/// Per-call context handed to [`ExecutionBackend::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireContext {
    /// Seed for any sampling the backend performs.
    pub seed: u64,
    /// Wall-clock deadline; a backend that cannot finish in time returns a partial chunk or an error.
    pub deadline: Option<Instant>,
    /// Acquisition round within the current triple.
    pub round: usize,
}

impl AcquireContext {
    /// Returns true when the deadline has passed.
    pub fn expired(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }
}

/// Executes measurement plans against a fixed, opaque state preparation.
///
/// Implementations return one chunk per plan entry, in plan order. Shot
/// shortfalls are reported through chunk status; an `Err` means nothing in
/// the call can be trusted.
pub trait ExecutionBackend: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    /// Runs every entry of `plan`.
    fn acquire(
        &self,
        plan: &MeasurementPlan,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawDatasetChunk>, QseError>;
}

/// Reference expectation value with its own uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// Expectation value including the observable coefficient.
    pub value: f64,
    /// One-sigma uncertainty of the reference (0 for exact values).
    pub uncertainty: f64,
}

impl TruthValue {
    /// Exact reference value.
    pub fn exact(value: f64) -> Self {
        Self {
            value,
            uncertainty: 0.0,
        }
    }
}

/// Source of ground-truth expectation values.
pub trait TruthOracle: Send + Sync {
    /// Truth for `observable`, or `None` when unknown.
    fn truth(&self, observable: &Observable) -> Option<TruthValue>;
}

/// Static truth lookup keyed by observable id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruthTable {
    values: BTreeMap<ObservableId, TruthValue>,
}

impl TruthTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, id: impl Into<ObservableId>, value: TruthValue) -> &mut Self {
        self.values.insert(id.into(), value);
        self
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &ObservableId) -> Option<TruthValue> {
        self.values.get(id).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no entries are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TruthOracle for TruthTable {
    fn truth(&self, observable: &Observable) -> Option<TruthValue> {
        self.get(observable.id())
    }
}
