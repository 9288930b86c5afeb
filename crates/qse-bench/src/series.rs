//! Estimates of one protocol indexed by increasing shot budget.

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, ObservableId, QseError};
use qse_est::Estimates;

/// Estimates obtained at one grid budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Grid budget.
    pub n: u64,
    /// Shots actually folded in.
    pub shots_used: u64,
    /// Classical compute time of the run.
    pub compute_seconds: f64,
    /// Finalized estimates.
    pub estimates: Estimates,
}

impl SeriesPoint {
    /// Point with `shots_used` taken from the estimates and no compute time.
    pub fn new(n: u64, estimates: Estimates) -> Self {
        Self {
            n,
            shots_used: estimates.shots_used,
            compute_seconds: 0.0,
            estimates,
        }
    }

    /// Sets the classical compute time.
    pub fn with_compute_seconds(mut self, seconds: f64) -> Self {
        self.compute_seconds = seconds;
        self
    }
}

/// Ordered `(n, Estimates)` points for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSeries {
    protocol: String,
    points: Vec<SeriesPoint>,
}

impl ShotSeries {
    /// Validates ordering and observable alignment.
    ///
    /// Budgets must be strictly increasing and every point must report the
    /// same observables in the same order.
    pub fn new(protocol: impl Into<String>, points: Vec<SeriesPoint>) -> Result<Self, QseError> {
        let protocol = protocol.into();
        let Some(first) = points.first() else {
            return Err(QseError::Configuration(
                ErrorInfo::new("empty-series", "series needs at least one grid point")
                    .with_context("protocol", &protocol),
            ));
        };
        if first.estimates.is_empty() {
            return Err(QseError::config("empty-estimates", "series points must report observables"));
        }
        let ids = ids_of(&first.estimates);
        for pair in points.windows(2) {
            if pair[0].n >= pair[1].n {
                return Err(QseError::Configuration(
                    ErrorInfo::new("unsorted-series", "series budgets must be strictly increasing")
                        .with_context("protocol", &protocol)
                        .with_context("n", pair[1].n),
                ));
            }
        }
        if let Some(point) = points.iter().find(|point| ids_of(&point.estimates) != ids) {
            return Err(QseError::Configuration(
                ErrorInfo::new("observable-mismatch", "series points report different observables")
                    .with_context("protocol", &protocol)
                    .with_context("n", point.n),
            ));
        }
        Ok(Self { protocol, points })
    }

    /// Series from bare `(n, estimates)` pairs.
    pub fn from_estimates(
        protocol: impl Into<String>,
        points: Vec<(u64, Estimates)>,
    ) -> Result<Self, QseError> {
        Self::new(
            protocol,
            points
                .into_iter()
                .map(|(n, estimates)| SeriesPoint::new(n, estimates))
                .collect(),
        )
    }

    /// Protocol name.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Points in increasing budget order.
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Budgets in order.
    pub fn grid(&self) -> Vec<u64> {
        self.points.iter().map(|point| point.n).collect()
    }

    /// Point with the largest budget.
    pub fn last(&self) -> &SeriesPoint {
        // Construction guarantees at least one point.
        &self.points[self.points.len() - 1]
    }

    /// Observable identifiers in reporting order.
    pub fn observable_ids(&self) -> Vec<ObservableId> {
        ids_of(&self.last().estimates)
    }

    pub(crate) fn ensure_same_grid(&self, other: &ShotSeries) -> Result<(), QseError> {
        if self.grid() != other.grid() {
            return Err(QseError::Configuration(
                ErrorInfo::new("grid-mismatch", "compared series must share one shot grid")
                    .with_context("a", &self.protocol)
                    .with_context("b", &other.protocol),
            ));
        }
        if self.observable_ids() != other.observable_ids() {
            return Err(QseError::Configuration(
                ErrorInfo::new("observable-mismatch", "compared series report different observables")
                    .with_context("a", &self.protocol)
                    .with_context("b", &other.protocol),
            ));
        }
        Ok(())
    }
}

fn ids_of(estimates: &Estimates) -> Vec<ObservableId> {
    estimates.iter().map(|entry| entry.id.clone()).collect()
}
