#![deny(missing_docs)]

//! Sweep orchestration for QSE benchmarks.
//!
//! [`run_sweep`] drives every (protocol, budget, replicate) triple of a
//! [`SweepConfig`] against an execution backend and assembles the long-form
//! record table. Configurations and results are hashed over canonical JSON,
//! and [`StatevectorBackend`] provides a small exact reference backend.

pub mod backend;
pub mod config;
pub mod hash;
pub mod serde;
pub mod sweep;

pub use backend::{StatevectorBackend, MAX_SITES};
pub use config::{load_sweep_config, Scheduler, SweepConfig};
pub use hash::stable_hash_string;
pub use self::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes};
pub use sweep::{run_sweep, ProtocolNStar, SweepReport, TripleReport};
