
use fixtures::{observables, synthetic};
use proptest::prelude::*;
use qse_bench::{records_for_triple, BenchmarkRecord, SeriesPoint, ShotGrid, ShotSeries, TripleKey};
use qse_core::TruthValue;
use qse_proto::RunStatus;

fn key() -> TripleKey {
    TripleKey {
        protocol: "direct_grouped".into(),
        protocol_index: 1,
        grid_index: 2,
        n_shots: 400,
        replicate: 3,
        seed: 42,
    }
}

#[test]
fn failed_triples_still_emit_one_record_per_observable() {
    let set = observables(3);
    let truths = vec![Some(TruthValue::exact(1.0)), None, Some(TruthValue::exact(0.5))];
    let records = records_for_triple(&key(), &set, None, &truths);
    assert_eq!(records.len(), 3);
    for (idx, record) in records.iter().enumerate() {
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.observable_index, idx);
        assert!(record.estimate.is_none() && record.ci_low.is_none() && record.covered.is_none());
    }
    assert_eq!(records[0].truth, Some(1.0));
    assert_eq!(records[1].truth, None);
}

#[test]
fn estimate_records_carry_errors_and_coverage() {
    let set = observables(2);
    let estimates = synthetic(&set, 400, &[1.0, 1.0]);
    let record = BenchmarkRecord::from_estimate(
        &key(),
        400,
        RunStatus::Success,
        &estimates.entries[0],
        Some(TruthValue::exact(0.6)),
    );
    assert_eq!(record.seed, 42);
    assert_eq!(record.replicate, 3);
    assert_eq!(record.covered, Some(true));
    assert!(record.abs_error.unwrap() < 1e-9);
    assert!(record.ci_low.unwrap() < record.ci_high.unwrap());
    assert!(record.ci_high_clamped.unwrap() <= 1.0);

    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("\"status\":\"success\""));
    assert!(json.contains("\"observable_id\":\"o0\""));
}

#[test]
fn series_budgets_must_increase() {
    let set = observables(2);
    let points = vec![
        SeriesPoint::new(200, synthetic(&set, 200, &[1.0; 2])),
        SeriesPoint::new(100, synthetic(&set, 100, &[1.0; 2])),
    ];
    let err = ShotSeries::new("shadow", points).unwrap_err();
    assert_eq!(err.info().code, "unsorted-series");
    assert!(ShotSeries::new("shadow", Vec::new()).is_err());
}

proptest! {
    #[test]
    fn geometric_grid_is_increasing_and_bounded(n_min in 1u64..500, ratio in 1.05f64..4.0, span in 1u64..50) {
        let n_max = n_min * span;
        let grid = ShotGrid::geometric(n_min, ratio, n_max).resolve().unwrap();
        prop_assert_eq!(grid[0], n_min);
        prop_assert_eq!(*grid.last().unwrap(), n_max);
        prop_assert!(grid.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
