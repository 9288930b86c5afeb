#![deny(missing_docs)]

//! Benchmark tasks over per-protocol estimate series.
//!
//! Tasks consume [`ShotSeries`] values built from finalized estimates and
//! never run protocols themselves. Budgets are compared on one shared
//! [`ShotGrid`], and any task needing ground truth takes explicit reference
//! values and rejects missing ones as configuration errors.

pub mod bias_variance;
pub mod distribution;
pub mod dominance;
pub mod efficiency;
pub mod grid;
pub mod nstar;
pub mod pilot;
pub mod record;
pub mod series;
pub mod truth;

pub use bias_variance::{bias_variance, BiasVarianceEntry, BiasVarianceReport};
pub use distribution::{fixed_budget_distribution, observable_metric, DistributionSummary, Metric};
pub use dominance::{crossover, dominance};
pub use efficiency::{adaptive_efficiency, EfficiencyReport, ProtocolCost};
pub use grid::ShotGrid;
pub use nstar::{
    average_target_n_star, shot_savings_factor, validate_epsilon, worst_case_n_star, Aggregate,
    NStar,
};
pub use pilot::{
    pilot_budget, pilot_selection, PilotCandidate, PilotChoice, PilotMetric, PilotReport, PilotTrial,
};
pub use record::{records_for_triple, BenchmarkRecord, TripleKey};
pub use series::{SeriesPoint, ShotSeries};
pub use truth::{lookup_truths, require_truths};
