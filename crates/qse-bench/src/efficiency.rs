//! Resource cost of an adaptive protocol against the best static protocol.

use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, QseError};
use qse_est::FwerSpec;

use crate::nstar::{shot_savings_factor, worst_case_n_star, NStar};
use crate::series::ShotSeries;

/// Cost of one protocol at its worst-case N*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolCost {
    /// Protocol name.
    pub protocol: String,
    /// Worst-case N* on the shared grid.
    pub n_star: NStar,
    /// Shots folded at N*.
    pub shots_used: Option<u64>,
    /// Classical compute time at N*.
    pub compute_seconds: Option<f64>,
    /// `shots_used + compute_weight * compute_seconds`.
    pub cost: Option<f64>,
}

/// Adaptive-versus-static comparison at a common accuracy target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    /// Shots charged per second of classical compute.
    pub compute_weight: f64,
    /// Adaptive protocol cost.
    pub adaptive: ProtocolCost,
    /// Static protocol costs in input order.
    pub statics: Vec<ProtocolCost>,
    /// Cheapest static protocol that reached the target.
    pub best_static: Option<String>,
    /// Adaptive cost divided by the best static cost.
    pub cost_ratio: Option<f64>,
    /// Best static N* divided by adaptive N*.
    pub shot_savings_factor: Option<f64>,
}

fn cost_of(series: &ShotSeries, epsilon: f64, fwer: &FwerSpec, weight: f64) -> Result<ProtocolCost, QseError> {
    let n_star = worst_case_n_star(series, epsilon, fwer)?;
    let point = match &n_star {
        NStar::Found { grid_index, .. } => Some(&series.points()[*grid_index]),
        NStar::NotFound { .. } => None,
    };
    Ok(ProtocolCost {
        protocol: series.protocol().to_string(),
        shots_used: point.map(|p| p.shots_used),
        compute_seconds: point.map(|p| p.compute_seconds),
        cost: point.map(|p| p.shots_used as f64 + weight * p.compute_seconds),
        n_star,
    })
}

/// Compares `adaptive` against every series in `statics` at accuracy `epsilon`.
pub fn adaptive_efficiency(
    adaptive: &ShotSeries,
    statics: &[ShotSeries],
    epsilon: f64,
    fwer: &FwerSpec,
    compute_weight: f64,
) -> Result<EfficiencyReport, QseError> {
    if !(compute_weight.is_finite() && compute_weight >= 0.0) {
        return Err(QseError::Configuration(
            ErrorInfo::new("invalid-compute-weight", "compute weight must be finite and non-negative")
                .with_context("compute_weight", compute_weight),
        ));
    }
    if statics.is_empty() {
        return Err(QseError::config("empty-baselines", "at least one static protocol is required"));
    }
    let adaptive_cost = cost_of(adaptive, epsilon, fwer, compute_weight)?;
    let static_costs = statics
        .iter()
        .map(|series| cost_of(series, epsilon, fwer, compute_weight))
        .collect::<Result<Vec<_>, _>>()?;
    let best = static_costs
        .iter()
        .filter_map(|c| c.cost.map(|cost| (c, cost)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let cost_ratio = match (adaptive_cost.cost, best) {
        (Some(a), Some((_, b))) if b > 0.0 => Some(a / b),
        _ => None,
    };
    let savings = best.and_then(|(c, _)| shot_savings_factor(&adaptive_cost.n_star, &c.n_star));
    Ok(EfficiencyReport {
        compute_weight,
        best_static: best.map(|(c, _)| c.protocol.clone()),
        cost_ratio,
        shot_savings_factor: savings,
        adaptive: adaptive_cost,
        statics: static_costs,
    })
}
