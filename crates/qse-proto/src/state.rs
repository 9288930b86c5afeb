use std::collections::BTreeSet;

use log::debug;
use qse_core::{
    ChunkStatus, ErrorInfo, MeasurementPlan, ObservableSet, QseError, RawDatasetChunk, RngHandle,
};
use qse_est::{
    estimate_observable, normal_quantile, Estimates, ObservableAccumulator, ParityWeights,
    ReadoutCorrection, SampleMoments,
};

use crate::config::ProtocolConfig;

/// Accumulators, issued plans and generator owned by one protocol instance.
#[derive(Debug, Clone)]
pub(crate) struct EstimationState {
    pub(crate) observables: ObservableSet,
    pub(crate) config: ProtocolConfig,
    accumulators: Vec<ObservableAccumulator>,
    weights: Vec<ParityWeights>,
    fallback: Vec<bool>,
    issued: Vec<MeasurementPlan>,
    /// (plan, entry) pairs already answered.
    answered: BTreeSet<(usize, usize)>,
    shots_used: u64,
    pub(crate) rng: RngHandle,
}

impl EstimationState {
    pub(crate) fn new(
        observables: ObservableSet,
        config: ProtocolConfig,
        correction: Option<&ReadoutCorrection>,
        seed: u64,
    ) -> Self {
        let supports: Vec<Vec<usize>> = observables.iter().map(|obs| obs.support_sites()).collect();
        let weights = supports
            .iter()
            .map(|support| match correction {
                Some(correction) => correction.parity_weights(support),
                None => ParityWeights::ideal(support.clone()),
            })
            .collect();
        let fallback = supports
            .iter()
            .map(|support| correction.map_or(false, |c| c.touches_fallback(support)))
            .collect();
        Self {
            accumulators: vec![ObservableAccumulator::new(); observables.len()],
            observables,
            config,
            weights,
            fallback,
            issued: Vec::new(),
            answered: BTreeSet::new(),
            shots_used: 0,
            rng: RngHandle::from_seed(seed),
        }
    }

    /// Remembers `plan` so later chunks can be matched against it.
    pub(crate) fn issue(&mut self, plan: MeasurementPlan) -> MeasurementPlan {
        self.issued.push(plan.clone());
        plan
    }

    pub(crate) fn shots_used(&self) -> u64 {
        self.shots_used
    }

    /// Folds one chunk from any plan issued so far.
    ///
    /// Each plan entry is answered at most once; a repeat is rejected.
    pub(crate) fn fold(&mut self, chunk: &RawDatasetChunk) -> Result<u64, QseError> {
        let (plan_index, plan) = self
            .issued
            .iter()
            .enumerate()
            .rev()
            .find(|(_, plan)| {
                plan.entries()
                    .get(chunk.entry)
                    .map_or(false, |entry| entry.setting == chunk.setting)
            })
            .ok_or_else(|| {
                QseError::Backend(
                    ErrorInfo::new("unknown-plan-entry", "chunk does not match any issued plan entry")
                        .with_context("entry", chunk.entry)
                        .with_context("setting", chunk.setting.label()),
                )
            })?;
        chunk.validate(plan)?;
        if !self.answered.insert((plan_index, chunk.entry)) {
            return Err(QseError::Backend(
                ErrorInfo::new("duplicate-chunk", "plan entry was already answered")
                    .with_context("plan", plan_index)
                    .with_context("entry", chunk.entry)
                    .with_context("setting", chunk.setting.label()),
            ));
        }
        if chunk.effective_status() == ChunkStatus::Failed && chunk.completed_shots == 0 {
            return Ok(0);
        }
        let entry = &plan.entries()[chunk.entry];
        for &idx in &entry.observables {
            let Some(observable) = self.observables.get(idx) else {
                continue;
            };
            let accumulator = &mut self.accumulators[idx];
            if chunk.setting.is_randomized() {
                accumulator.fold_shadow(chunk, observable, &self.weights[idx]);
            } else {
                accumulator.fold_direct(chunk, observable, &self.weights[idx]);
            }
        }
        self.shots_used += chunk.completed_shots;
        debug!(
            "folded {} shots for setting {} ({} observables)",
            chunk.completed_shots,
            chunk.setting.label(),
            entry.observables.len()
        );
        Ok(chunk.completed_shots)
    }

    /// Current sample moments per observable.
    pub(crate) fn running_moments(&self) -> Vec<SampleMoments> {
        self.accumulators
            .iter()
            .map(ObservableAccumulator::running_moments)
            .collect()
    }

    /// Normal-approximation half-widths from the running sums; infinite without data.
    pub(crate) fn running_half_widths(&self) -> Vec<f64> {
        let z = normal_quantile(0.5 + self.config.confidence_level / 2.0);
        self.accumulators
            .iter()
            .map(|acc| {
                if acc.effective_samples() == 0 {
                    f64::INFINITY
                } else {
                    z * acc.running_moments().std_error()
                }
            })
            .collect()
    }

    pub(crate) fn finalize(&mut self) -> Estimates {
        let entries = self
            .observables
            .iter()
            .enumerate()
            .map(|(idx, observable)| {
                estimate_observable(
                    observable,
                    idx,
                    &self.accumulators[idx],
                    &self.config.estimator,
                    self.config.confidence_level,
                    self.fallback[idx],
                    &mut self.rng,
                )
            })
            .collect();
        Estimates {
            entries,
            shots_used: self.shots_used,
            confidence_level: self.config.confidence_level,
        }
    }
}
