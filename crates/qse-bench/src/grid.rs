//! Shot grids shared by every protocol in a sweep.

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, QseError};

/// Upper bound on grid points, guarding against ratios barely above one.
const MAX_GRID_POINTS: usize = 4096;

/// Shot budgets at which every protocol is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShotGrid {
    /// `n_min * ratio^k`, rounded, up to `n_max`.
    Geometric {
        /// Smallest budget.
        n_min: u64,
        /// Growth ratio, strictly above one.
        ratio: f64,
        /// Largest budget; always included.
        n_max: u64,
    },
    /// Caller-supplied budgets in strictly increasing order.
    Explicit {
        /// Budgets.
        values: Vec<u64>,
    },
}

impl ShotGrid {
    /// Geometric grid.
    pub fn geometric(n_min: u64, ratio: f64, n_max: u64) -> Self {
        ShotGrid::Geometric { n_min, ratio, n_max }
    }

    /// Rejects grids that cannot be resolved to positive increasing budgets.
    pub fn validate(&self) -> Result<(), QseError> {
        match self {
            ShotGrid::Geometric { n_min, ratio, n_max } => {
                if *n_min == 0 {
                    return Err(QseError::config("non-positive-budget", "n_min must be positive"));
                }
                if !(ratio.is_finite() && *ratio > 1.0) {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("invalid-grid-ratio", "grid ratio must exceed 1")
                            .with_context("ratio", ratio),
                    ));
                }
                if n_max < n_min {
                    return Err(QseError::Configuration(
                        ErrorInfo::new("invalid-grid-bounds", "n_max must be at least n_min")
                            .with_context("n_min", n_min)
                            .with_context("n_max", n_max),
                    ));
                }
                Ok(())
            }
            ShotGrid::Explicit { values } => {
                if values.is_empty() {
                    return Err(QseError::config("empty-grid", "shot grid must list at least one budget"));
                }
                if values[0] == 0 {
                    return Err(QseError::config("non-positive-budget", "shot budgets must be positive"));
                }
                if values.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(QseError::config(
                        "unsorted-grid",
                        "explicit shot budgets must be strictly increasing",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Resolves the grid into concrete budgets.
    pub fn resolve(&self) -> Result<Vec<u64>, QseError> {
        self.validate()?;
        match self {
            ShotGrid::Geometric { n_min, ratio, n_max } => {
                let mut values: Vec<u64> = Vec::new();
                let mut step = 0i32;
                loop {
                    let value = (*n_min as f64 * ratio.powi(step)).round() as u64;
                    if value > *n_max {
                        break;
                    }
                    if values.last() != Some(&value) {
                        values.push(value);
                    }
                    if values.len() >= MAX_GRID_POINTS {
                        return Err(QseError::Configuration(
                            ErrorInfo::new("grid-too-large", "geometric grid has too many points")
                                .with_context("limit", MAX_GRID_POINTS),
                        ));
                    }
                    step += 1;
                }
                if values.last() != Some(n_max) {
                    values.push(*n_max);
                }
                Ok(values)
            }
            ShotGrid::Explicit { values } => Ok(values.clone()),
        }
    }
}
