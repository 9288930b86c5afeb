mod fixtures;

use std::collections::BTreeSet;

use fixtures::{bell_observables, config, init_logging, plus_state, z_strings, FlakyBackend};
use qse_bench::{lookup_truths, pilot_selection, PilotCandidate, PilotMetric, PilotTrial};
use qse_core::{NoiseDescriptor, ObservableSet, ReadoutConfusion, TruthOracle};
use qse_est::{simultaneous_intervals, FwerMethod, FwerSpec};
use qse_exp::{run_sweep, StatevectorBackend};
use qse_proto::{ProtocolKind, RunStatus};

#[test]
fn bell_state_grouped_estimates_cover_exact_values() {
    init_logging();
    let backend = StatevectorBackend::bell_pair();
    let config = config(bell_observables(), vec![ProtocolKind::DirectGrouped], vec![2000], 1);
    let report = run_sweep(&config, &backend, Some(&backend)).unwrap();

    assert_eq!(report.triples.len(), 1);
    assert_eq!(report.triples[0].status, RunStatus::Success);
    assert_eq!(report.triples[0].shots_used, 2000);
    assert_eq!(report.records.len(), 4);

    let zz = &report.records[0];
    let xx = &report.records[1];
    assert_eq!(zz.observable_id.as_str(), "o0");
    assert!((zz.estimate.unwrap() - 1.0).abs() < 1e-12);
    assert!((xx.estimate.unwrap() + 1.0).abs() < 1e-12);
    assert!((xx.truth.unwrap() + 1.0).abs() < 1e-12);
    for (record, truth) in [(zz, 1.0), (xx, -1.0)] {
        assert!(record.ci_low.unwrap() <= truth + 1e-9);
        assert!(record.ci_high.unwrap() >= truth - 1e-9);
    }
    for record in &report.records[2..] {
        assert!(record.estimate.unwrap().abs() < 0.2);
        assert!(record.abs_error.unwrap() < 0.2);
    }
}

#[test]
fn report_is_identical_for_any_pool_size() {
    let backend = StatevectorBackend::bell_pair();
    let mut serial = config(
        bell_observables(),
        vec![
            ProtocolKind::DirectNaive,
            ProtocolKind::Shadow,
            ProtocolKind::AdaptiveGrouped,
        ],
        vec![200, 400],
        2,
    );
    let mut parallel = serial.clone();
    serial.scheduler.parallelism = 1;
    parallel.scheduler.parallelism = 4;

    let a = run_sweep(&serial, &backend, Some(&backend)).unwrap();
    let b = run_sweep(&parallel, &backend, Some(&backend)).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.records, b.records);
    let statuses = |report: &qse_exp::SweepReport| {
        report
            .triples
            .iter()
            .map(|triple| (triple.seed, triple.status, triple.shots_used))
            .collect::<Vec<_>>()
    };
    assert_eq!(statuses(&a), statuses(&b));
}

#[test]
fn every_triple_gets_its_own_seed() {
    let backend = StatevectorBackend::bell_pair();
    let config = config(
        bell_observables(),
        vec![ProtocolKind::DirectNaive, ProtocolKind::DirectGrouped],
        vec![100, 200, 400],
        3,
    );
    let report = run_sweep(&config, &backend, None).unwrap();
    assert_eq!(report.triples.len(), 18);
    let seeds: BTreeSet<u64> = report.triples.iter().map(|triple| triple.seed).collect();
    assert_eq!(seeds.len(), 18);

    let first = &report.triples[0];
    let last = &report.triples[17];
    assert_eq!((first.protocol, first.grid_index, first.replicate), (ProtocolKind::DirectNaive, 0, 0));
    assert_eq!((last.protocol, last.grid_index, last.replicate), (ProtocolKind::DirectGrouped, 2, 2));
    assert!(report.records.iter().all(|record| record.truth.is_none()));
    assert_eq!(report.provenance.seed, 7);
    assert_eq!(report.provenance.config_hash, report.config_hash);
}

#[test]
fn backend_outage_fails_only_its_triples() {
    init_logging();
    let backend = FlakyBackend {
        inner: StatevectorBackend::bell_pair(),
        fail_budget: 400,
    };
    let config = config(bell_observables(), vec![ProtocolKind::DirectGrouped], vec![200, 400, 800], 2);
    let report = run_sweep(&config, &backend, None).unwrap();

    assert_eq!(report.count_status(RunStatus::Failed), 2);
    assert_eq!(report.count_status(RunStatus::Success), 4);
    assert_eq!(report.records.len(), 6 * 4);
    for triple in report.triples.iter().filter(|triple| triple.n_shots == 400) {
        assert_eq!(triple.status, RunStatus::Failed);
        assert_eq!(triple.failure.as_ref().unwrap().info().code, "device-offline");
        assert!(triple.estimates.is_none());
    }
    let failed: Vec<_> = report
        .records
        .iter()
        .filter(|record| record.status == RunStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 8);
    assert!(failed.iter().all(|record| record.estimate.is_none() && record.n_shots == 400));

    let series = report.series(ProtocolKind::DirectGrouped, 0).unwrap();
    assert_eq!(series.grid(), vec![200, 800]);
}

#[test]
fn shot_shortfall_is_reported_as_partial() {
    let backend = StatevectorBackend::bell_pair().with_shot_cap(50);
    let config = config(bell_observables(), vec![ProtocolKind::DirectGrouped], vec![600], 1);
    let report = run_sweep(&config, &backend, None).unwrap();
    let triple = &report.triples[0];
    assert_eq!(triple.status, RunStatus::Partial);
    assert!(triple.shots_used < 600);
    assert!(report
        .records
        .iter()
        .all(|record| record.status == RunStatus::Partial && record.estimate.is_some()));
}

#[test]
fn bonferroni_family_coverage_meets_nominal_level() {
    let backend = plus_state(3);
    let observables = z_strings(3);
    let replicates = 50;
    let config = config(observables.clone(), vec![ProtocolKind::DirectGrouped], vec![400], replicates);
    let report = run_sweep(&config, &backend, None).unwrap();

    let truths: Vec<f64> = lookup_truths(&observables, &backend as &dyn TruthOracle)
        .into_iter()
        .map(|truth| truth.unwrap().value)
        .collect();
    let spec = FwerSpec::new(FwerMethod::Bonferroni, 0.1).unwrap();
    let misses = report
        .triples
        .iter()
        .filter(|triple| {
            let estimates = triple.estimates.as_ref().unwrap();
            !simultaneous_intervals(estimates, &spec).unwrap().all_contain(&truths)
        })
        .count();
    // 1 - delta = 0.9 nominal; allow Monte Carlo slack over 50 trials.
    assert!(misses <= 12, "family misses: {misses}");
}

fn exact_values(observables: &ObservableSet, backend: &StatevectorBackend) -> Vec<f64> {
    lookup_truths(observables, backend as &dyn TruthOracle)
        .into_iter()
        .map(|truth| truth.unwrap().value)
        .collect()
}

#[test]
fn shadow_protocols_recover_exact_values() {
    init_logging();
    let shadow_kinds = vec![
        ProtocolKind::Shadow,
        ProtocolKind::ShadowNoiseAware,
        ProtocolKind::AdaptiveShadow,
    ];
    let bell_terms =
        ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", -1.0), ("YY", 0.5), ("ZI", 1.0)]).unwrap();
    let ghz_terms = ObservableSet::from_labels(&[("ZZI", 1.0), ("IZZ", 1.0), ("XXX", 1.0)]).unwrap();
    let cases = [
        (StatevectorBackend::bell_pair(), bell_terms, 6000),
        (StatevectorBackend::ghz(3).unwrap(), ghz_terms, 12_000),
    ];
    let spec = FwerSpec::new(FwerMethod::Bonferroni, 0.001).unwrap();
    for (backend, observables, budget) in cases {
        let truths = exact_values(&observables, &backend);
        let config = config(observables, shadow_kinds.clone(), vec![budget], 1);
        let report = run_sweep(&config, &backend, Some(&backend)).unwrap();
        assert_eq!(report.count_status(RunStatus::Success), 3);
        for triple in &report.triples {
            let estimates = triple.estimates.as_ref().unwrap();
            let simultaneous = simultaneous_intervals(estimates, &spec).unwrap();
            assert!(
                simultaneous.all_contain(&truths),
                "{} missed {:?}: {:?}",
                triple.protocol,
                truths,
                estimates.iter().map(|e| e.estimate).collect::<Vec<_>>()
            );
        }
    }
}

#[test]
fn noise_aware_shadow_removes_readout_bias() {
    let noise = NoiseDescriptor::Uniform(ReadoutConfusion::new(0.1, 0.1));
    let backend = StatevectorBackend::bell_pair().with_readout(noise.clone()).unwrap();
    let observables = ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", 1.0)]).unwrap();
    let mut config = config(
        observables,
        vec![ProtocolKind::Shadow, ProtocolKind::ShadowNoiseAware],
        vec![8000],
        1,
    );
    config.noise = Some(noise);
    let report = run_sweep(&config, &backend, Some(&backend)).unwrap();

    let plain = report.triples[0].estimates.as_ref().unwrap();
    let aware = report.triples[1].estimates.as_ref().unwrap();
    assert_eq!(report.triples[1].protocol, ProtocolKind::ShadowNoiseAware);
    for idx in 0..2 {
        // Two flipped sites scale an ideal parity of 1 by (1 - 2p)^2 = 0.64.
        let biased = plain.entries[idx].estimate;
        assert!((biased - 0.64).abs() < 0.15, "plain estimate {biased}");
        assert!(!plain.entries[idx].interval_at(0.001).contains(1.0));

        let corrected = &aware.entries[idx];
        assert!((corrected.estimate - 1.0).abs() < 0.2, "corrected estimate {}", corrected.estimate);
        assert!(corrected.interval_at(0.001).contains(1.0));
    }
    assert!(!aware.any_noise_fallback());
}

#[test]
fn two_percent_pilot_picks_the_grouped_protocol() {
    let backend = plus_state(4);
    let n_target = 10_000;
    let n_pilot = 200;
    let replicates = 10;
    let protocols = vec![ProtocolKind::DirectNaive, ProtocolKind::DirectGrouped];
    let config = config(z_strings(4), protocols.clone(), vec![n_pilot, n_target], replicates);
    let report = run_sweep(&config, &backend, None).unwrap();

    let trials: Vec<PilotTrial> = (0..replicates)
        .map(|replicate| PilotTrial {
            candidates: protocols
                .iter()
                .map(|&kind| {
                    let series = report.series(kind, replicate).unwrap();
                    PilotCandidate {
                        protocol: kind.as_str().to_string(),
                        pilot: series.points()[0].estimates.clone(),
                        full: series.points()[1].estimates.clone(),
                    }
                })
                .collect(),
        })
        .collect();
    let pilot = pilot_selection(&trials, n_pilot, n_target, PilotMetric::MaxHalfWidth).unwrap();
    assert!(pilot.accuracy > 0.5);
    assert!(pilot
        .choices
        .iter()
        .all(|choice| choice.oracle_choice == "direct_grouped"));
}

#[test]
fn n_star_summary_is_attached_when_requested() {
    let backend = StatevectorBackend::bell_pair();
    let mut config = config(
        bell_observables(),
        vec![ProtocolKind::DirectGrouped],
        vec![100, 400, 1600, 6400],
        1,
    );
    config.epsilon = Some(0.1);
    config.fwer = Some(FwerSpec::new(FwerMethod::Bonferroni, 0.05).unwrap());
    let report = run_sweep(&config, &backend, Some(&backend)).unwrap();
    assert_eq!(report.n_star.len(), 1);
    let summary = &report.n_star[0];
    assert_eq!(summary.protocol, ProtocolKind::DirectGrouped);
    assert!(summary.n_star.is_found());
    assert!(summary.n_star.n().unwrap() >= 400);
}

#[test]
fn invalid_configuration_aborts_before_work() {
    let backend = StatevectorBackend::bell_pair();
    let mut config = config(bell_observables(), vec![ProtocolKind::DirectGrouped], vec![100], 0);
    let err = run_sweep(&config, &backend, None).unwrap_err();
    assert_eq!(err.info().code, "zero-replicates");

    config.replicates = 1;
    config.confidence_level = 1.5;
    let err = run_sweep(&config, &backend, None).unwrap_err();
    assert!(err.is_configuration());
}
