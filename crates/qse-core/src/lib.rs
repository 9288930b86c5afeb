#![deny(missing_docs)]
#![doc = "Core observable model, plan and dataset types, and the shared error surface of the QSE shot-estimation engine."]

pub mod backend;
pub mod chunk;
pub mod errors;
pub mod noise;
pub mod observable;
pub mod plan;
pub mod provenance;
pub mod rng;

pub use backend::{AcquireContext, ExecutionBackend, TruthOracle, TruthTable, TruthValue};
pub use chunk::{Bitstring, ChunkStatus, RandomizedShot, RawDatasetChunk};
pub use errors::{ErrorInfo, QseError};
pub use noise::{NoiseDescriptor, ReadoutConfusion};
pub use observable::{Observable, ObservableId, ObservableSet, ObservableSetSpec, Pauli};
pub use plan::{MeasurementPlan, MeasurementSetting, PlanEntry};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, triple_seed, RngHandle};
