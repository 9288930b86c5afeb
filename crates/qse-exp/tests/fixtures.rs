#![allow(dead_code)]

use nalgebra::Complex;
use qse_bench::ShotGrid;
use qse_core::{
    AcquireContext, ErrorInfo, ExecutionBackend, MeasurementPlan, ObservableSet, QseError,
    RawDatasetChunk,
};
use qse_exp::{StatevectorBackend, SweepConfig};
use qse_proto::ProtocolKind;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// ZZ with coefficient 1 and XX with coefficient -1, plus two zero-mean terms.
pub fn bell_observables() -> ObservableSet {
    ObservableSet::from_labels(&[("ZZ", 1.0), ("XX", -1.0), ("ZI", 1.0), ("IX", 0.5)]).unwrap()
}

/// Every Z-type string on `sites` sites up to weight two; all have zero mean on `|+...+>`.
pub fn z_strings(sites: usize) -> ObservableSet {
    let mut labels = Vec::new();
    for a in 0..sites {
        let mut single = vec!['I'; sites];
        single[a] = 'Z';
        labels.push(single.iter().collect::<String>());
        for b in (a + 1)..sites {
            let mut pair = vec!['I'; sites];
            pair[a] = 'Z';
            pair[b] = 'Z';
            labels.push(pair.iter().collect::<String>());
        }
    }
    let terms: Vec<(&str, f64)> = labels.iter().map(|label| (label.as_str(), 1.0)).collect();
    ObservableSet::from_labels(&terms).unwrap()
}

/// Uniform superposition `|+...+>`.
pub fn plus_state(sites: usize) -> StatevectorBackend {
    StatevectorBackend::from_amplitudes(sites, vec![Complex::new(1.0, 0.0); 1 << sites]).unwrap()
}

pub fn config(
    observables: ObservableSet,
    protocols: Vec<ProtocolKind>,
    budgets: Vec<u64>,
    replicates: usize,
) -> SweepConfig {
    SweepConfig::new(
        observables,
        protocols,
        ShotGrid::Explicit { values: budgets },
        replicates,
        7,
        0.95,
    )
}

/// Fails every acquisition whose plan requests exactly `fail_budget` shots.
pub struct FlakyBackend {
    pub inner: StatevectorBackend,
    pub fail_budget: u64,
}

impl ExecutionBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn acquire(
        &self,
        plan: &MeasurementPlan,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawDatasetChunk>, QseError> {
        if plan.total_shots() == self.fail_budget {
            return Err(QseError::Backend(
                ErrorInfo::new("device-offline", "simulated outage")
                    .with_context("shots", plan.total_shots()),
            ));
        }
        self.inner.acquire(plan, ctx)
    }
}
