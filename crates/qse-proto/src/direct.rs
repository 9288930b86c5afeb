//! Static fixed-basis protocols: naive, grouped and coefficient-weighted.

use std::time::Instant;

use log::debug;

use qse_core::{MeasurementPlan, QseError, RawDatasetChunk};
use qse_est::Estimates;
use qse_group::{allocate_shots, group_weights, AllocationPolicy, Group};

use crate::config::ProtocolKind;
use crate::protocol::{fixed_plan, Protocol, RoundRecord, StopReason};
use crate::state::EstimationState;

/// One plan over fixed settings, consuming the whole remaining budget.
#[derive(Debug)]
pub(crate) struct DirectProtocol {
    kind: ProtocolKind,
    state: EstimationState,
    groups: Vec<Group>,
    policy: AllocationPolicy,
    rounds: Vec<RoundRecord>,
}

impl DirectProtocol {
    pub(crate) fn new(
        kind: ProtocolKind,
        state: EstimationState,
        groups: Vec<Group>,
        policy: AllocationPolicy,
    ) -> Self {
        Self {
            kind,
            state,
            groups,
            policy,
            rounds: Vec::new(),
        }
    }
}

impl Protocol for DirectProtocol {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    fn budget(&self) -> u64 {
        self.state.config.total_shots
    }

    fn next_plan(&mut self, remaining: u64) -> Result<Option<MeasurementPlan>, QseError> {
        if !self.rounds.is_empty() || remaining == 0 {
            return Ok(None);
        }
        let started = Instant::now();
        let weights = group_weights(&self.policy, &self.groups, &self.state.observables)?;
        let shots = allocate_shots(remaining, &weights)?;
        let plan = fixed_plan(&self.groups, &shots, &self.state.observables)?;
        debug!(
            "{} planned {} settings for {} shots",
            self.kind,
            plan.len(),
            plan.total_shots()
        );
        let mut record = RoundRecord::planned(0, plan.total_shots(), started.elapsed().as_secs_f64());
        record.stop = Some(StopReason::PlanComplete);
        self.rounds.push(record);
        Ok(Some(self.state.issue(plan)))
    }

    fn update(&mut self, chunk: &RawDatasetChunk) -> Result<(), QseError> {
        let started = Instant::now();
        let folded = self.state.fold(chunk)?;
        if let Some(round) = self.rounds.last_mut() {
            round.shots_acquired += folded;
            round.compute_seconds += started.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Estimates, QseError> {
        let started = Instant::now();
        let estimates = self.state.finalize();
        if let Some(round) = self.rounds.last_mut() {
            round.compute_seconds += started.elapsed().as_secs_f64();
        }
        Ok(estimates)
    }

    fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }
}
