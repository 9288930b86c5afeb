#![deny(missing_docs)]

//! Commutation-aware grouping of observables into measurement settings and
//! shot allocation across the resulting settings.

mod allocate;
mod conflict;
mod greedy;

pub use allocate::{allocate_shots, group_weights, AllocationPolicy};
pub use conflict::ConflictGraph;
pub use greedy::{group, group_observables, Group, Grouping};
