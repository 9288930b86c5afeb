//! Static randomized-basis protocols.

use std::time::Instant;

use log::debug;

use qse_core::{MeasurementPlan, QseError, RawDatasetChunk};
use qse_est::Estimates;

use crate::config::ProtocolKind;
use crate::protocol::{randomized_plan, Protocol, RoundRecord, StopReason};
use crate::state::EstimationState;

/// A single randomized setting whose per-shot bases come from the protocol generator.
#[derive(Debug)]
pub(crate) struct ShadowProtocol {
    kind: ProtocolKind,
    state: EstimationState,
    rounds: Vec<RoundRecord>,
}

impl ShadowProtocol {
    pub(crate) fn new(kind: ProtocolKind, state: EstimationState) -> Self {
        Self {
            kind,
            state,
            rounds: Vec::new(),
        }
    }
}

impl Protocol for ShadowProtocol {
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
        let plan = randomized_plan(&mut self.state.rng, remaining, &self.state.observables)?;
        debug!("{} drew {} random basis assignments", self.kind, remaining);
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
