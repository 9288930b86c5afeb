//! Multi-round protocols with an explicit stopping predicate.
//!
//! Each call to `next_plan` first evaluates the stopping predicate in a fixed
//! order (round limit, budget, half-width target) and only then sizes the
//! next round. The pilot round spends `pilot_fraction` of the budget; every
//! later round takes an even share of what is left over the rounds that
//! remain, so the final permitted round always consumes the remainder.

use std::time::Instant;

use log::{debug, info};

use qse_core::{MeasurementPlan, QseError, RawDatasetChunk};
use qse_est::Estimates;
use qse_group::{allocate_shots, Group};

use crate::config::ProtocolKind;
use crate::protocol::{fixed_plan, randomized_plan, Protocol, RoundRecord, StopReason};
use crate::state::EstimationState;

/// Round-by-round protocol over fixed groups or randomized bases.
#[derive(Debug)]
pub(crate) struct AdaptiveProtocol {
    kind: ProtocolKind,
    state: EstimationState,
    /// `None` for randomized rounds.
    groups: Option<Vec<Group>>,
    rounds: Vec<RoundRecord>,
    stopped: Option<StopReason>,
}

impl AdaptiveProtocol {
    pub(crate) fn new(kind: ProtocolKind, state: EstimationState, groups: Option<Vec<Group>>) -> Self {
        Self {
            kind,
            state,
            groups,
            rounds: Vec::new(),
            stopped: None,
        }
    }

    fn stop_reason(&self, remaining: u64) -> Option<StopReason> {
        let round = self.rounds.len();
        if round >= self.state.config.adaptive.max_rounds {
            return Some(StopReason::MaxRounds);
        }
        if remaining == 0 {
            return Some(StopReason::BudgetExhausted);
        }
        let target = self.state.config.adaptive.early_stop_half_width?;
        if round > 0
            && self
                .state
                .running_half_widths()
                .iter()
                .all(|&half_width| half_width <= target)
        {
            return Some(StopReason::TargetReached);
        }
        None
    }

    fn round_shots(&self, remaining: u64) -> u64 {
        let adaptive = &self.state.config.adaptive;
        let round = self.rounds.len();
        let rounds_left = (adaptive.max_rounds - round) as u64;
        if rounds_left <= 1 {
            return remaining;
        }
        if round == 0 {
            let settings = self.groups.as_ref().map_or(1, Vec::len) as u64;
            let pilot = (adaptive.pilot_fraction * self.state.config.total_shots as f64).ceil() as u64;
            return pilot.max(settings).min(remaining);
        }
        remaining.div_ceil(rounds_left)
    }

    /// Largest running variance among each group's members; `c^2` stands in
    /// for members without at least two samples.
    fn variance_weights(&self, groups: &[Group]) -> Vec<f64> {
        let moments = self.state.running_moments();
        groups
            .iter()
            .map(|group| {
                group
                    .members
                    .iter()
                    .map(|&idx| match (moments.get(idx), self.state.observables.get(idx)) {
                        (Some(m), _) if m.count >= 2 => m.variance,
                        (_, Some(observable)) => observable.coefficient().powi(2),
                        _ => 0.0,
                    })
                    .fold(0.0, f64::max)
            })
            .collect()
    }

    fn plan_round(&mut self, shots: u64) -> Result<MeasurementPlan, QseError> {
        match &self.groups {
            Some(groups) => {
                let weights = if self.rounds.is_empty() {
                    vec![1.0; groups.len()]
                } else {
                    self.variance_weights(groups)
                };
                let allocation = allocate_shots(shots, &weights)?;
                fixed_plan(groups, &allocation, &self.state.observables)
            }
            None => randomized_plan(&mut self.state.rng, shots, &self.state.observables),
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.stopped = Some(reason);
        if let Some(round) = self.rounds.last_mut() {
            round.stop = Some(reason);
        }
        info!(
            "{} stopped after {} rounds ({reason:?}, {} shots folded)",
            self.kind,
            self.rounds.len(),
            self.state.shots_used()
        );
    }
}

impl Protocol for AdaptiveProtocol {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    fn budget(&self) -> u64 {
        self.state.config.total_shots
    }

    fn next_plan(&mut self, remaining: u64) -> Result<Option<MeasurementPlan>, QseError> {
        if self.stopped.is_some() {
            return Ok(None);
        }
        let started = Instant::now();
        if let Some(reason) = self.stop_reason(remaining) {
            self.stop(reason);
            return Ok(None);
        }
        let shots = self.round_shots(remaining);
        let plan = self.plan_round(shots)?;
        let index = self.rounds.len();
        debug!(
            "{} round {index}: {} shots over {} settings ({} remaining)",
            self.kind,
            plan.total_shots(),
            plan.len(),
            remaining
        );
        self.rounds.push(RoundRecord::planned(
            index,
            plan.total_shots(),
            started.elapsed().as_secs_f64(),
        ));
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
        if self.stopped.is_none() {
            self.stop(StopReason::Interrupted);
        }
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
