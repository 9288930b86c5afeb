mod fixtures;

use std::time::{Duration, Instant};

use fixtures::{init_logging, mixed_observables, z_observables, FlipBackend, Tamper, TamperingBackend};
use qse_core::{NoiseDescriptor, ObservableId, ObservableSet, QseError, ReadoutConfusion};
use qse_proto::{
    execute, initialize, CancelToken, ExecutionOptions, ProtocolConfig, ProtocolContext, ProtocolKind,
    RunStatus, StopReason,
};

fn run(
    kind: ProtocolKind,
    config: ProtocolConfig,
    context: &ProtocolContext,
    backend: &FlipBackend,
    options: &ExecutionOptions,
) -> qse_proto::ExecutionOutcome {
    let mut protocol = initialize(kind, z_observables(), config, context, 17).unwrap();
    execute(protocol.as_mut(), backend, options).unwrap()
}

fn estimate_of(outcome: &qse_proto::ExecutionOutcome, id: &str) -> f64 {
    outcome.estimates.get(&ObservableId::from(id)).unwrap().estimate
}

#[test]
fn grouped_run_recovers_flip_biased_parities() {
    init_logging();
    let backend = FlipBackend::new(0.1);
    let outcome = run(
        ProtocolKind::DirectGrouped,
        ProtocolConfig::new(4000, 0.95),
        &ProtocolContext::default(),
        &backend,
        &ExecutionOptions::seeded(3),
    );
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.shots_used(), 4000);
    assert_eq!(outcome.shots_requested, 4000);
    assert!((estimate_of(&outcome, "o0") - 0.8).abs() < 0.05);
    assert!((estimate_of(&outcome, "o2") - 0.32).abs() < 0.05);
}

#[test]
fn readout_correction_removes_flip_bias() {
    let backend = FlipBackend::new(0.1);
    let context = ProtocolContext::with_noise(NoiseDescriptor::Uniform(ReadoutConfusion::new(0.1, 0.1)));
    let outcome = run(
        ProtocolKind::DirectGrouped,
        ProtocolConfig::new(4000, 0.95),
        &context,
        &backend,
        &ExecutionOptions::seeded(3),
    );
    assert!((estimate_of(&outcome, "o0") - 1.0).abs() < 0.06);
    assert!((estimate_of(&outcome, "o2") - 0.5).abs() < 0.06);
    assert!(!outcome.estimates.any_noise_fallback());
}

#[test]
fn identical_seeds_give_identical_estimates() {
    let backend = FlipBackend::new(0.2);
    for kind in [ProtocolKind::Shadow, ProtocolKind::AdaptiveGrouped] {
        let first = run(
            kind,
            ProtocolConfig::new(800, 0.95),
            &ProtocolContext::default(),
            &backend,
            &ExecutionOptions::seeded(9),
        );
        let second = run(
            kind,
            ProtocolConfig::new(800, 0.95),
            &ProtocolContext::default(),
            &backend,
            &ExecutionOptions::seeded(9),
        );
        assert_eq!(first.estimates, second.estimates, "{kind}");
    }
}

#[test]
fn short_chunks_are_folded_and_flagged_partial() {
    let backend = FlipBackend {
        max_completed: Some(50),
        ..FlipBackend::new(0.1)
    };
    let outcome = run(
        ProtocolKind::DirectGrouped,
        ProtocolConfig::new(600, 0.95),
        &ProtocolContext::default(),
        &backend,
        &ExecutionOptions::seeded(1),
    );
    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.shots_used(), 50);
    assert_eq!(outcome.shots_requested, 600);
    assert!(outcome.estimates.iter().all(|e| !e.diagnostics.insufficient_data));
}

#[test]
fn backend_error_on_first_round_fails_the_run() {
    let backend = FlipBackend {
        fail_round: Some(0),
        ..FlipBackend::new(0.1)
    };
    let outcome = run(
        ProtocolKind::DirectNaive,
        ProtocolConfig::new(300, 0.95),
        &ProtocolContext::default(),
        &backend,
        &ExecutionOptions::seeded(1),
    );
    assert_eq!(outcome.status, RunStatus::Failed);
    let failure = outcome.failure.expect("failure recorded");
    assert_eq!(failure.info().code, "device-offline");
    assert!(outcome.estimates.iter().all(|e| e.diagnostics.insufficient_data));
}

#[test]
fn later_backend_error_keeps_earlier_rounds() {
    let backend = FlipBackend {
        fail_round: Some(1),
        ..FlipBackend::new(0.1)
    };
    let outcome = run(
        ProtocolKind::AdaptiveGrouped,
        ProtocolConfig::new(1000, 0.95),
        &ProtocolContext::default(),
        &backend,
        &ExecutionOptions::seeded(1),
    );
    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.shots_used(), 100);
    assert_eq!(outcome.rounds[0].shots_acquired, 100);
    assert_eq!(outcome.rounds.last().unwrap().stop, Some(StopReason::Interrupted));
}

#[test]
fn cancellation_keeps_acquired_data() {
    let token = CancelToken::new();
    let backend = FlipBackend {
        cancel_after_first: Some(token.clone()),
        ..FlipBackend::new(0.1)
    };
    let options = ExecutionOptions {
        seed: 4,
        deadline: None,
        cancel: Some(token),
    };
    let outcome = run(
        ProtocolKind::AdaptiveShadow,
        ProtocolConfig::new(1000, 0.95),
        &ProtocolContext::default(),
        &backend,
        &options,
    );
    assert!(outcome.cancelled);
    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.shots_used(), 100);
    assert_eq!(outcome.rounds.len(), 1);
    assert_eq!(outcome.rounds[0].stop, Some(StopReason::Interrupted));
}

#[test]
fn expired_deadline_stops_before_acquiring() {
    let backend = FlipBackend::new(0.1);
    let options = ExecutionOptions {
        seed: 4,
        deadline: Some(Instant::now() - Duration::from_millis(1)),
        cancel: None,
    };
    let outcome = run(
        ProtocolKind::DirectGrouped,
        ProtocolConfig::new(500, 0.95),
        &ProtocolContext::default(),
        &backend,
        &options,
    );
    assert!(outcome.cancelled);
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn early_stop_target_ends_adaptive_run() {
    let backend = FlipBackend::new(0.1);
    let mut config = ProtocolConfig::new(2000, 0.95);
    config.adaptive.early_stop_half_width = Some(10.0);
    let mut protocol = initialize(
        ProtocolKind::AdaptiveGrouped,
        mixed_observables(),
        config,
        &ProtocolContext::default(),
        5,
    )
    .unwrap();
    let outcome = execute(protocol.as_mut(), &backend, &ExecutionOptions::seeded(5)).unwrap();
    assert_eq!(outcome.rounds.len(), 1);
    assert_eq!(outcome.rounds[0].stop, Some(StopReason::TargetReached));
    assert_eq!(outcome.shots_used(), 200);
    assert_eq!(outcome.status, RunStatus::Success);
}

#[test]
fn adaptive_run_records_round_history() {
    let backend = FlipBackend::new(0.1);
    let outcome = run(
        ProtocolKind::AdaptiveGrouped,
        ProtocolConfig::new(1200, 0.95),
        &ProtocolContext::default(),
        &backend,
        &ExecutionOptions::seeded(8),
    );
    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome.rounds.len() <= 4);
    assert_eq!(outcome.rounds.iter().map(|r| r.shots_acquired).sum::<u64>(), 1200);
    assert!(outcome.rounds.iter().all(|r| r.compute_seconds >= 0.0));
    assert_eq!(outcome.rounds.last().unwrap().stop, Some(StopReason::MaxRounds));
}

fn run_tampered(kind: ProtocolKind, observables: ObservableSet, tamper: Tamper) -> qse_proto::ExecutionOutcome {
    let backend = TamperingBackend {
        inner: FlipBackend::new(0.1),
        tamper,
    };
    let mut protocol = initialize(
        kind,
        observables,
        ProtocolConfig::new(600, 0.95),
        &ProtocolContext::default(),
        21,
    )
    .unwrap();
    execute(protocol.as_mut(), &backend, &ExecutionOptions::seeded(21)).unwrap()
}

fn zz_xx() -> ObservableSet {
    ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", 1.0)]).unwrap()
}

#[test]
fn short_basis_record_is_a_backend_error() {
    init_logging();
    let outcome = run_tampered(ProtocolKind::Shadow, zz_xx(), Tamper::ShortBases);
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.shots_used(), 0);
    let failure = outcome.failure.expect("failure recorded");
    assert!(matches!(failure, QseError::Backend(_)));
    assert_eq!(failure.info().code, "malformed-basis-record");
}

#[test]
fn bases_off_the_schedule_are_rejected() {
    let outcome = run_tampered(ProtocolKind::Shadow, zz_xx(), Tamper::SwappedBases);
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.failure.expect("failure recorded").info().code, "schedule-mismatch");
}

#[test]
fn repeated_chunk_is_not_folded_twice() {
    let outcome = run_tampered(ProtocolKind::DirectGrouped, mixed_observables(), Tamper::DuplicateFirst);
    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.failure.as_ref().expect("failure recorded").info().code, "duplicate-chunk");
    assert!(outcome.shots_used() < outcome.shots_requested);
}

#[test]
fn unanswered_entry_marks_the_run_partial() {
    let outcome = run_tampered(ProtocolKind::DirectGrouped, mixed_observables(), Tamper::DropLast);
    assert_eq!(outcome.status, RunStatus::Partial);
    assert!(outcome.failure.is_none());
    assert!(outcome.estimates.iter().any(|e| e.diagnostics.insufficient_data));
}
