use qse_core::{Observable, ObservableSet, Pauli};
use qse_group::{group, group_observables, ConflictGraph};
use proptest::prelude::*;

fn pauli_strategy() -> impl Strategy<Value = Pauli> {
    prop_oneof![Just(Pauli::I), Just(Pauli::X), Just(Pauli::Y), Just(Pauli::Z)]
}

fn observable_set_strategy() -> impl Strategy<Value = ObservableSet> {
    (1usize..6).prop_flat_map(|sites| {
        prop::collection::vec(
            (prop::collection::vec(pauli_strategy(), sites), -2.0f64..2.0),
            1..24,
        )
        .prop_map(move |terms| {
            let mut observables: Vec<Observable> = Vec::new();
            for (idx, (paulis, coeff)) in terms.into_iter().enumerate() {
                let duplicate = observables
                    .iter()
                    .any(|o| o.paulis() == paulis.as_slice() && o.coefficient() == coeff);
                if !duplicate {
                    observables.push(Observable::new(format!("t{idx}").as_str(), paulis, coeff).unwrap());
                }
            }
            ObservableSet::new(sites, observables).unwrap()
        })
    })
}

proptest! {
    #[test]
    fn groups_are_internally_compatible(set in observable_set_strategy()) {
        let grouping = group_observables(&set).unwrap();
        let graph = ConflictGraph::from_observables(&set);
        prop_assert!(grouping.len() <= set.len());
        let mut seen = vec![false; set.len()];
        for g in &grouping.groups {
            prop_assert!(graph.is_independent(&g.members));
            for &member in &g.members {
                let observable = set.get(member).unwrap();
                prop_assert!(observable.is_measurable_in(&g.bases));
                prop_assert!(!seen[member]);
                seen[member] = true;
            }
        }
        prop_assert!(seen.into_iter().all(|covered| covered));
    }

    #[test]
    fn plan_covers_every_observable(set in observable_set_strategy()) {
        let plan = group(&set).unwrap();
        prop_assert!(plan.len() <= set.len());
        prop_assert_eq!(plan.total_shots(), 0);
    }
}

#[test]
fn same_site_different_bases_are_split() {
    let set = ObservableSet::from_labels(&[("X", 1.0), ("Z", 1.0)]).unwrap();
    let grouping = group_observables(&set).unwrap();
    assert_eq!(grouping.len(), 2);
    assert_eq!(grouping.conflict_edges, 1);
}

#[test]
fn commuting_set_needs_one_group() {
    let set = ObservableSet::from_labels(&[
        ("ZZII", 1.0),
        ("IZZI", 0.5),
        ("IIZZ", 0.25),
        ("ZIIZ", -1.0),
        ("ZIII", 0.1),
    ])
    .unwrap();
    let grouping = group_observables(&set).unwrap();
    assert_eq!(grouping.len(), 1);
    assert_eq!(grouping.conflict_edges, 0);
    assert_eq!(grouping.groups[0].bases, vec![Pauli::Z; 4]);
}

#[test]
fn bell_observables_need_two_settings() {
    let set = ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", -1.0)]).unwrap();
    let plan = group(&set).unwrap();
    assert_eq!(plan.len(), 2);
    let plan = plan.with_allocation(&[1000, 1000]).unwrap();
    assert_eq!(plan.total_shots(), 2000);
}

#[test]
fn conflict_graph_lists_qubitwise_conflicts() {
    let set = ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", 1.0), ("ZI", 1.0)]).unwrap();
    let graph = ConflictGraph::from_observables(&set);
    assert_eq!(graph.neighbors(0), &[1]);
    assert_eq!(graph.neighbors(1), &[0, 2]);
    assert_eq!(graph.neighbors(2), &[1]);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.is_independent(&[0, 2]));
    assert!(!graph.is_independent(&[1, 2]));
}
