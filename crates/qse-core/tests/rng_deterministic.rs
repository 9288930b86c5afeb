use std::collections::BTreeSet;

use qse_core::rng::{derive_substream_seed, triple_seed, RngHandle};
use rand::RngCore;

#[test]
fn rng_emits_reproducible_sequence() {
    let mut rng_a = RngHandle::from_seed(1234);
    let mut rng_b = RngHandle::from_seed(1234);

    let seq_a: Vec<u64> = (0..100).map(|_| rng_a.next_u64()).collect();
    let seq_b: Vec<u64> = (0..100).map(|_| rng_b.next_u64()).collect();

    assert_eq!(seq_a, seq_b);
}

#[test]
fn substreams_differ() {
    let mut first = RngHandle::substream(7, 0);
    let mut second = RngHandle::substream(7, 1);
    assert_ne!(first.next_u64(), second.next_u64());
    assert_eq!(derive_substream_seed(7, 3), derive_substream_seed(7, 3));
}

#[test]
fn triple_seeds_are_unique_over_a_grid() {
    let mut seen = BTreeSet::new();
    for protocol in 0..4 {
        for grid in 0..8 {
            for replicate in 0..16 {
                assert!(seen.insert(triple_seed(2024, protocol, grid, replicate)));
            }
        }
    }
    assert_ne!(triple_seed(1, 0, 1, 0), triple_seed(1, 1, 0, 0));
}
