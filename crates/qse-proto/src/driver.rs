//! Runs one protocol instance to completion against an execution backend.
//!
//! The driver is the only place that blocks: it alternates `next_plan`,
//! `acquire` and `update` until the protocol stops planning, the budget is
//! spent, the deadline passes or the cancel flag is raised. Backend errors
//! and malformed chunks end acquisition for the run but never discard the
//! chunks already folded.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use qse_core::{derive_substream_seed, AcquireContext, ChunkStatus, ExecutionBackend, QseError};
use qse_est::Estimates;

use crate::protocol::{Protocol, RoundRecord};

/// Shared flag that stops a run at the next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run execution settings.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Seed from which every acquisition round's backend seed is derived.
    pub seed: u64,
    /// Wall-clock deadline for the whole run.
    pub deadline: Option<Instant>,
    /// Optional cancellation flag.
    pub cancel: Option<CancelToken>,
}

impl ExecutionOptions {
    /// Options with a seed and no deadline or cancellation.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    fn interrupted(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
            || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }
}

/// Outcome status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every requested shot was acquired.
    Success,
    /// Some data was acquired but the run fell short or was interrupted.
    Partial,
    /// Nothing usable was acquired.
    Failed,
}

impl RunStatus {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Final estimates from every folded chunk.
    pub estimates: Estimates,
    /// Overall status.
    pub status: RunStatus,
    /// Round history reported by the protocol.
    pub rounds: Vec<RoundRecord>,
    /// Classical compute time summed over rounds.
    pub compute_seconds: f64,
    /// Shots requested across every issued plan.
    pub shots_requested: u64,
    /// Error that ended acquisition early, if any.
    pub failure: Option<QseError>,
    /// True when the cancel flag or deadline stopped the run.
    pub cancelled: bool,
}

impl ExecutionOutcome {
    /// Shots folded into the estimates.
    pub fn shots_used(&self) -> u64 {
        self.estimates.shots_used
    }
}

/// Drives `protocol` against `backend` until it stops planning.
///
/// Only errors raised while planning or finalizing are returned; backend
/// failures and rejected chunks are recorded on the outcome instead.
pub fn execute(
    protocol: &mut dyn Protocol,
    backend: &dyn ExecutionBackend,
    options: &ExecutionOptions,
) -> Result<ExecutionOutcome, QseError> {
    let budget = protocol.budget();
    let mut shots_requested = 0u64;
    let mut failure = None;
    let mut cancelled = false;
    let mut degraded = false;
    let mut round = 0usize;

    loop {
        if options.interrupted() {
            cancelled = true;
            break;
        }
        let remaining = budget.saturating_sub(shots_requested);
        let Some(plan) = protocol.next_plan(remaining)? else {
            break;
        };
        shots_requested += plan.total_shots();
        if options.interrupted() {
            cancelled = true;
            break;
        }

        let ctx = AcquireContext {
            seed: derive_substream_seed(options.seed, round as u64),
            deadline: options.deadline,
            round,
        };
        let chunks = match backend.acquire(&plan, &ctx) {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!("backend {} failed in round {round}: {err}", backend.name());
                failure = Some(err);
                break;
            }
        };
        let answered: BTreeSet<usize> = chunks.iter().map(|chunk| chunk.entry).collect();
        let unanswered = (0..plan.len()).filter(|entry| !answered.contains(entry)).count();
        if unanswered > 0 || chunks.len() != plan.len() {
            degraded = true;
            warn!(
                "backend {} returned {} chunks for {} settings in round {round} ({unanswered} unanswered)",
                backend.name(),
                chunks.len(),
                plan.len()
            );
        }
        for chunk in &chunks {
            if chunk.effective_status() != ChunkStatus::Success {
                degraded = true;
                warn!(
                    "setting {} completed {}/{} shots ({:?})",
                    chunk.setting.label(),
                    chunk.completed_shots,
                    chunk.requested_shots,
                    chunk.failure
                );
            }
            if let Err(err) = protocol.update(chunk) {
                warn!("rejected chunk from backend {}: {err}", backend.name());
                failure = Some(err);
                break;
            }
        }
        if failure.is_some() {
            break;
        }
        debug!("round {round} complete ({shots_requested}/{budget} shots requested)");
        round += 1;
    }

    let estimates = protocol.finalize()?;
    let rounds = protocol.rounds().to_vec();
    let compute_seconds = rounds.iter().map(|r| r.compute_seconds).sum();
    let status = if estimates.shots_used == 0 && (failure.is_some() || cancelled || degraded) {
        RunStatus::Failed
    } else if failure.is_some() || cancelled || degraded || estimates.shots_used < shots_requested {
        RunStatus::Partial
    } else {
        RunStatus::Success
    };
    Ok(ExecutionOutcome {
        estimates,
        status,
        rounds,
        compute_seconds,
        shots_requested,
        failure,
        cancelled,
    })
}
