use std::cmp::Ordering;

use log::debug;
use qse_core::{MeasurementPlan, Observable, ObservableSet, Pauli, PlanEntry, QseError};

use crate::conflict::ConflictGraph;

/// One measurement setting and the observables it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Accumulated per-site bases; identity sites are free.
    pub bases: Vec<Pauli>,
    /// Reporting indices of the members, in insertion order.
    pub members: Vec<usize>,
}

impl Group {
    fn open(observable: &Observable, index: usize) -> Self {
        Self {
            bases: observable.paulis().to_vec(),
            members: vec![index],
        }
    }

    fn accepts(&self, observable: &Observable) -> bool {
        observable
            .support()
            .all(|(site, pauli)| self.bases[site].is_identity() || self.bases[site] == pauli)
    }

    fn absorb(&mut self, observable: &Observable, index: usize) {
        for (site, pauli) in observable.support() {
            self.bases[site] = pauli;
        }
        self.members.push(index);
    }
}

/// Result of greedy grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    /// Groups in the order they were opened.
    pub groups: Vec<Group>,
    /// Conflict edges in the observable set.
    pub conflict_edges: usize,
}

impl Grouping {
    /// Number of settings.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no group was produced.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Converts the grouping into a plan carrying the given per-group shot counts.
    pub fn into_plan(self, shots: &[u64], observables: &ObservableSet) -> Result<MeasurementPlan, QseError> {
        if shots.len() != self.groups.len() {
            return Err(QseError::config(
                "allocation-length-mismatch",
                "one shot count per group required",
            ));
        }
        let entries = self
            .groups
            .into_iter()
            .zip(shots)
            .map(|(group, &count)| {
                let mut members = group.members;
                members.sort_unstable();
                PlanEntry::fixed(group.bases, count, members)
            })
            .collect();
        MeasurementPlan::new(entries, observables)
    }
}

fn greedy_order(a: &(usize, &Observable), b: &(usize, &Observable)) -> Ordering {
    b.1.locality()
        .cmp(&a.1.locality())
        .then_with(|| b.1.coefficient().abs().total_cmp(&a.1.coefficient().abs()))
        .then_with(|| a.0.cmp(&b.0))
}

/// Partitions `observables` into mutually compatible groups.
///
/// Observables are visited by descending locality, then descending
/// coefficient magnitude, then reporting index, and placed in the first open
/// group whose accumulated bases agree on every shared site.
pub fn group_observables(observables: &ObservableSet) -> Result<Grouping, QseError> {
    if observables.is_empty() {
        return Err(QseError::config(
            "empty-observable-set",
            "cannot group an empty observable set",
        ));
    }
    let mut order: Vec<(usize, &Observable)> = observables.iter().enumerate().collect();
    order.sort_by(greedy_order);

    let mut groups: Vec<Group> = Vec::new();
    for (index, observable) in order {
        match groups.iter_mut().find(|group| group.accepts(observable)) {
            Some(group) => group.absorb(observable, index),
            None => groups.push(Group::open(observable, index)),
        }
    }

    let conflict_edges = ConflictGraph::from_observables(observables).edge_count();
    debug!(
        "grouped {} observables into {} settings ({} conflict edges)",
        observables.len(),
        groups.len(),
        conflict_edges
    );
    Ok(Grouping {
        groups,
        conflict_edges,
    })
}

/// Groups `observables` and returns an unallocated plan (zero shots per setting).
///
/// Callers size the plan with [`MeasurementPlan::with_allocation`].
pub fn group(observables: &ObservableSet) -> Result<MeasurementPlan, QseError> {
    let grouping = group_observables(observables)?;
    let zeros = vec![0; grouping.len()];
    grouping.into_plan(&zeros, observables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_locality_goes_first() {
        let set = ObservableSet::from_labels(&[("ZI", 1.0), ("XX", 1.0), ("ZZ", 0.5)]).unwrap();
        let grouping = group_observables(&set).unwrap();
        assert_eq!(grouping.groups[0].members, vec![1]);
        assert_eq!(grouping.groups[1].members, vec![2, 0]);
    }

    #[test]
    fn free_sites_adopt_later_bases() {
        let set = ObservableSet::from_labels(&[("ZII", 1.0), ("IXI", 1.0), ("IIY", 1.0)]).unwrap();
        let grouping = group_observables(&set).unwrap();
        assert_eq!(grouping.len(), 1);
        assert_eq!(grouping.groups[0].bases, vec![Pauli::Z, Pauli::X, Pauli::Y]);
    }
}
