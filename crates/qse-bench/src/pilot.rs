//! Pilot-based protocol selection scored against the full-budget oracle.
//!
//! Each trial runs every candidate twice: once at the pilot budget and once
//! at the target budget. The pilot metric is extrapolated to the target by
//! `sqrt(n_pilot / n_target)` and the smallest prediction wins. The oracle
//! picks the smallest metric at the target budget. Regret is the oracle
//! metric of the pilot choice minus the oracle best, so it is never negative.

use log::debug;
use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, QseError};
use qse_est::Estimates;

/// Score compared between candidates; smaller is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotMetric {
    /// Largest per-observable half-width.
    MaxHalfWidth,
    /// Mean per-observable half-width.
    MeanHalfWidth,
}

impl PilotMetric {
    /// Scores one estimate set.
    pub fn score(&self, estimates: &Estimates) -> f64 {
        match self {
            PilotMetric::MaxHalfWidth => estimates.max_half_width(),
            PilotMetric::MeanHalfWidth => {
                if estimates.is_empty() {
                    return f64::NAN;
                }
                estimates.iter().map(|e| e.half_width()).sum::<f64>() / estimates.len() as f64
            }
        }
    }
}

/// One protocol's pilot and full-budget estimates within a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotCandidate {
    /// Protocol name.
    pub protocol: String,
    /// Estimates at the pilot budget.
    pub pilot: Estimates,
    /// Estimates at the target budget.
    pub full: Estimates,
}

/// Candidates compared in one independent trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotTrial {
    /// Candidates in a fixed order.
    pub candidates: Vec<PilotCandidate>,
}

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotChoice {
    /// Protocol chosen from pilot data.
    pub pilot_choice: String,
    /// Protocol best at the target budget.
    pub oracle_choice: String,
    /// Extrapolated target metric of the pilot choice.
    pub predicted: f64,
    /// Target-budget metric gap between the pilot choice and the oracle choice.
    pub regret: f64,
}

impl PilotChoice {
    /// True when the pilot picked the oracle's protocol.
    pub fn correct(&self) -> bool {
        self.pilot_choice == self.oracle_choice
    }
}

/// Selection accuracy and regret across trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotReport {
    /// Pilot budget.
    pub n_pilot: u64,
    /// Target budget.
    pub n_target: u64,
    /// Metric used for both choices.
    pub metric: PilotMetric,
    /// Per-trial choices.
    pub choices: Vec<PilotChoice>,
    /// Fraction of trials where the pilot matched the oracle.
    pub accuracy: f64,
    /// Mean regret.
    pub mean_regret: f64,
    /// Largest regret.
    pub max_regret: f64,
}

/// Pilot budget for a target budget and pilot fraction in `(0, 1]`.
pub fn pilot_budget(n_target: u64, fraction: f64) -> Result<u64, QseError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(QseError::Configuration(
            ErrorInfo::new("invalid-pilot-fraction", "pilot fraction must lie in (0, 1]")
                .with_context("pilot_fraction", fraction),
        ));
    }
    Ok(((n_target as f64 * fraction).ceil() as u64).clamp(1, n_target.max(1)))
}

fn argmin(scores: &[f64]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_score), (idx, &score)| {
            if score < best_score {
                (idx, score)
            } else {
                (best, best_score)
            }
        })
        .0
}

/// Scores pilot-based selection against the oracle over `trials`.
pub fn pilot_selection(
    trials: &[PilotTrial],
    n_pilot: u64,
    n_target: u64,
    metric: PilotMetric,
) -> Result<PilotReport, QseError> {
    if n_pilot == 0 || n_pilot > n_target {
        return Err(QseError::Configuration(
            ErrorInfo::new("invalid-pilot-budget", "pilot budget must lie in [1, n_target]")
                .with_context("n_pilot", n_pilot)
                .with_context("n_target", n_target),
        ));
    }
    if trials.is_empty() {
        return Err(QseError::config("empty-trials", "pilot selection needs at least one trial"));
    }
    let scale = (n_pilot as f64 / n_target as f64).sqrt();
    let mut choices = Vec::with_capacity(trials.len());
    for (idx, trial) in trials.iter().enumerate() {
        if trial.candidates.is_empty() {
            return Err(QseError::Configuration(
                ErrorInfo::new("empty-candidates", "trial has no candidate protocols")
                    .with_context("trial", idx),
            ));
        }
        let predicted: Vec<f64> = trial
            .candidates
            .iter()
            .map(|c| metric.score(&c.pilot) * scale)
            .collect();
        let actual: Vec<f64> = trial.candidates.iter().map(|c| metric.score(&c.full)).collect();
        let pick = argmin(&predicted);
        let oracle = argmin(&actual);
        choices.push(PilotChoice {
            pilot_choice: trial.candidates[pick].protocol.clone(),
            oracle_choice: trial.candidates[oracle].protocol.clone(),
            predicted: predicted[pick],
            regret: actual[pick] - actual[oracle],
        });
    }
    let count = choices.len() as f64;
    let accuracy = choices.iter().filter(|c| c.correct()).count() as f64 / count;
    let mean_regret = choices.iter().map(|c| c.regret).sum::<f64>() / count;
    let max_regret = choices.iter().map(|c| c.regret).fold(0.0, f64::max);
    debug!("pilot selection over {} trials: accuracy {accuracy:.3}", choices.len());
    Ok(PilotReport {
        n_pilot,
        n_target,
        metric,
        choices,
        accuracy,
        mean_regret,
        max_regret,
    })
}
