use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qse_core::rng::RngHandle;
use qse_core::{Observable, ObservableSet, Pauli};
use qse_group::group_observables;
use rand::Rng;

fn random_set(sites: usize, terms: usize, seed: u64) -> ObservableSet {
    let mut rng = RngHandle::from_seed(seed);
    let mut observables = Vec::with_capacity(terms);
    for idx in 0..terms {
        let paulis: Vec<Pauli> = (0..sites)
            .map(|_| match rng.gen_range(0..4) {
                0 => Pauli::I,
                1 => Pauli::X,
                2 => Pauli::Y,
                _ => Pauli::Z,
            })
            .collect();
        let coeff = rng.gen_range(-1.0..1.0) + idx as f64 * 1e-9;
        observables.push(Observable::new(format!("h{idx}").as_str(), paulis, coeff).unwrap());
    }
    ObservableSet::new(sites, observables).unwrap()
}

fn grouping_bench(c: &mut Criterion) {
    let set = random_set(12, 500, 42);
    c.bench_function("group_500_terms_12_sites", |b| {
        b.iter(|| {
            let grouping = group_observables(black_box(&set)).unwrap();
            black_box(grouping);
        });
    });
}

criterion_group!(benches, grouping_bench);
criterion_main!(benches);
