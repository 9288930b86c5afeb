//! Dominance and crossover between two protocols on a shared grid.

use qse_core::{ObservableId, QseError, TruthValue};

use crate::distribution::{observable_metric, Metric};
use crate::nstar::NStar;
use crate::series::ShotSeries;

/// Per grid point, whether `a` beats `b` on each observable (strictly smaller metric).
fn wins(
    a: &ShotSeries,
    b: &ShotSeries,
    metric: Metric,
    truths: Option<&[TruthValue]>,
) -> Result<Vec<Vec<bool>>, QseError> {
    a.ensure_same_grid(b)?;
    a.points()
        .iter()
        .zip(b.points())
        .map(|(pa, pb)| {
            let ma = observable_metric(&pa.estimates, metric, truths)?;
            let mb = observable_metric(&pb.estimates, metric, truths)?;
            Ok(ma.iter().zip(&mb).map(|(x, y)| x < y).collect())
        })
        .collect()
}

fn not_found(a: &ShotSeries, last_wins: &[bool]) -> NStar {
    let blocking: Vec<ObservableId> = a
        .observable_ids()
        .into_iter()
        .zip(last_wins)
        .filter(|(_, &won)| !won)
        .map(|(id, _)| id)
        .collect();
    NStar::NotFound {
        largest_n: a.last().n,
        blocking,
    }
}

/// First grid budget at which `a` beats `b` on every observable.
pub fn dominance(
    a: &ShotSeries,
    b: &ShotSeries,
    metric: Metric,
    truths: Option<&[TruthValue]>,
) -> Result<NStar, QseError> {
    let table = wins(a, b, metric, truths)?;
    if let Some(grid_index) = table.iter().position(|row| row.iter().all(|&won| won)) {
        return Ok(NStar::Found {
            n: a.points()[grid_index].n,
            grid_index,
        });
    }
    Ok(not_found(a, table.last().map(Vec::as_slice).unwrap_or(&[])))
}

/// First grid budget from which `a` beats `b` on every observable at every larger budget.
pub fn crossover(
    a: &ShotSeries,
    b: &ShotSeries,
    metric: Metric,
    truths: Option<&[TruthValue]>,
) -> Result<NStar, QseError> {
    let table = wins(a, b, metric, truths)?;
    let mut start = None;
    for (grid_index, row) in table.iter().enumerate().rev() {
        if row.iter().all(|&won| won) {
            start = Some(grid_index);
        } else {
            break;
        }
    }
    match start {
        Some(grid_index) => Ok(NStar::Found {
            n: a.points()[grid_index].n,
            grid_index,
        }),
        None => Ok(not_found(a, table.last().map(Vec::as_slice).unwrap_or(&[]))),
    }
}
