//! The protocol contract and its constructor.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use qse_core::{
    MeasurementPlan, ObservableSet, Pauli, PlanEntry, QseError, RawDatasetChunk, RngHandle,
};
use qse_est::{Estimates, ReadoutCorrection};
use qse_group::{group_observables, AllocationPolicy, Group};

use crate::adaptive::AdaptiveProtocol;
use crate::config::{ProtocolConfig, ProtocolContext, ProtocolKind};
use crate::direct::DirectProtocol;
use crate::shadow::ShadowProtocol;
use crate::state::EstimationState;

/// Why a protocol stopped planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A static protocol issued its single plan.
    PlanComplete,
    /// The round limit was reached.
    MaxRounds,
    /// No budget was left.
    BudgetExhausted,
    /// Every running half-width met the early-stop target.
    TargetReached,
    /// Finalized before the protocol decided to stop (cancellation or deadline).
    Interrupted,
}

/// Bookkeeping for one acquisition round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Zero-based round index.
    pub index: usize,
    /// Shots requested by the round's plan.
    pub shots_planned: u64,
    /// Shots folded from the round's chunks.
    pub shots_acquired: u64,
    /// Classical compute time spent planning, folding and finalizing.
    pub compute_seconds: f64,
    /// Set on the last round once the protocol stops.
    pub stop: Option<StopReason>,
}

impl RoundRecord {
    pub(crate) fn planned(index: usize, shots_planned: u64, compute_seconds: f64) -> Self {
        Self {
            index,
            shots_planned,
            shots_acquired: 0,
            compute_seconds,
            stop: None,
        }
    }
}

/// Uniform contract implemented by every measurement strategy.
///
/// A protocol owns its state, including its generator; instances are never
/// shared between replicates. Only [`next_plan`](Protocol::next_plan),
/// [`update`](Protocol::update) and [`finalize`](Protocol::finalize) mutate it,
/// and none of them performs I/O.
pub trait Protocol: Send {
    /// Strategy implemented by this instance.
    fn kind(&self) -> ProtocolKind;

    /// Total shot budget from the configuration.
    fn budget(&self) -> u64;

    /// Next plan to acquire, or `None` once nothing is left to plan.
    ///
    /// Static protocols return a single plan consuming `remaining`; adaptive
    /// protocols return one round at a time.
    fn next_plan(&mut self, remaining: u64) -> Result<Option<MeasurementPlan>, QseError>;

    /// Folds one acquired chunk from any plan issued so far, including partial ones.
    fn update(&mut self, chunk: &RawDatasetChunk) -> Result<(), QseError>;

    /// Produces the final estimates from everything folded so far.
    fn finalize(&mut self) -> Result<Estimates, QseError>;

    /// Round history.
    fn rounds(&self) -> &[RoundRecord];
}

/// Validates inputs and builds a protocol of the requested kind.
///
/// The noise descriptor in `context` is only used by kinds that correct
/// readout; the generator is seeded from `seed` alone.
pub fn initialize(
    kind: ProtocolKind,
    observables: ObservableSet,
    config: ProtocolConfig,
    context: &ProtocolContext,
    seed: u64,
) -> Result<Box<dyn Protocol>, QseError> {
    if observables.is_empty() {
        return Err(QseError::config(
            "empty-observable-set",
            "observable set must contain at least one observable",
        ));
    }
    config.validate()?;
    context.validate(&observables)?;

    let correction = match (&context.noise, kind.corrects_readout()) {
        (Some(noise), true) => Some(ReadoutCorrection::new(
            noise,
            observables.num_sites(),
            config.estimator.max_condition,
        )?),
        _ => None,
    };
    debug!(
        "initializing {kind} for {} observables with budget {} (readout correction: {})",
        observables.len(),
        config.total_shots,
        correction.is_some()
    );

    let groups = match kind {
        ProtocolKind::DirectNaive => singleton_groups(&observables),
        ProtocolKind::DirectGrouped | ProtocolKind::DirectOptimized | ProtocolKind::AdaptiveGrouped => {
            group_observables(&observables)?.groups
        }
        ProtocolKind::Shadow | ProtocolKind::ShadowNoiseAware | ProtocolKind::AdaptiveShadow => Vec::new(),
    };
    let state = EstimationState::new(observables, config, correction.as_ref(), seed);

    let protocol: Box<dyn Protocol> = match kind {
        ProtocolKind::DirectNaive | ProtocolKind::DirectGrouped => {
            Box::new(DirectProtocol::new(kind, state, groups, AllocationPolicy::Equal))
        }
        ProtocolKind::DirectOptimized => Box::new(DirectProtocol::new(
            kind,
            state,
            groups,
            AllocationPolicy::MaxCoefficientSquared,
        )),
        ProtocolKind::Shadow | ProtocolKind::ShadowNoiseAware => Box::new(ShadowProtocol::new(kind, state)),
        ProtocolKind::AdaptiveGrouped => Box::new(AdaptiveProtocol::new(kind, state, Some(groups))),
        ProtocolKind::AdaptiveShadow => Box::new(AdaptiveProtocol::new(kind, state, None)),
    };
    Ok(protocol)
}

fn singleton_groups(observables: &ObservableSet) -> Vec<Group> {
    observables
        .iter()
        .enumerate()
        .map(|(idx, observable)| Group {
            bases: observable.paulis().to_vec(),
            members: vec![idx],
        })
        .collect()
}

/// Plan with one fixed entry per group.
pub(crate) fn fixed_plan(
    groups: &[Group],
    shots: &[u64],
    observables: &ObservableSet,
) -> Result<MeasurementPlan, QseError> {
    let entries = groups
        .iter()
        .zip(shots)
        .map(|(group, &count)| {
            let mut members = group.members.clone();
            members.sort_unstable();
            PlanEntry::fixed(group.bases.clone(), count, members)
        })
        .collect();
    MeasurementPlan::new(entries, observables)
}

/// Plan with one randomized entry serving every observable.
pub(crate) fn randomized_plan(
    rng: &mut RngHandle,
    shots: u64,
    observables: &ObservableSet,
) -> Result<MeasurementPlan, QseError> {
    let sites = observables.num_sites();
    let schedule = (0..shots)
        .map(|_| {
            (0..sites)
                .map(|_| Pauli::MEASURABLE[rng.gen_range(0..Pauli::MEASURABLE.len())])
                .collect()
        })
        .collect();
    let members = (0..observables.len()).collect();
    MeasurementPlan::new(vec![PlanEntry::randomized(sites, schedule, members)], observables)
}
