#![deny(missing_docs)]

//! Measurement protocol state machines and the execution driver.
//!
//! Every strategy implements [`Protocol`]: [`initialize`] validates inputs
//! and seeds the instance, `next_plan` and `update` alternate with backend
//! acquisition, and `finalize` turns the folded data into [`qse_est::Estimates`].

mod adaptive;
pub mod config;
mod direct;
pub mod driver;
pub mod protocol;
mod shadow;
mod state;

pub use config::{AdaptiveConfig, ProtocolConfig, ProtocolContext, ProtocolKind};
pub use driver::{execute, CancelToken, ExecutionOptions, ExecutionOutcome, RunStatus};
pub use protocol::{initialize, Protocol, RoundRecord, StopReason};
