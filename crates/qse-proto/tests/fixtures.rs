#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use qse_core::{
    AcquireContext, Bitstring, ErrorInfo, ExecutionBackend, MeasurementPlan, ObservableSet, Pauli,
    QseError, RandomizedShot, RawDatasetChunk,
};
use qse_proto::CancelToken;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Backend preparing `|0...0>` where every measured bit flips with probability `flip`.
///
/// A k-local Z-type parity therefore has expectation `(1 - 2 flip)^k`.
#[derive(Debug, Default)]
pub struct FlipBackend {
    pub flip: f64,
    /// Caps the completed shots of every chunk.
    pub max_completed: Option<u64>,
    /// Round at which `acquire` fails outright.
    pub fail_round: Option<usize>,
    /// Cancelled after the first successful acquisition.
    pub cancel_after_first: Option<CancelToken>,
    pub calls: AtomicUsize,
}

impl FlipBackend {
    pub fn new(flip: f64) -> Self {
        Self {
            flip,
            ..Self::default()
        }
    }

    fn outcome(&self, rng: &mut StdRng, sites: usize) -> Bitstring {
        Bitstring::from_bits((0..sites).map(|_| rng.gen_bool(self.flip)).collect())
    }
}

impl ExecutionBackend for FlipBackend {
    fn name(&self) -> &str {
        "flip"
    }

    fn acquire(
        &self,
        plan: &MeasurementPlan,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawDatasetChunk>, QseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_round == Some(ctx.round) {
            return Err(QseError::Backend(
                ErrorInfo::new("device-offline", "simulated outage").with_context("round", ctx.round),
            ));
        }
        let mut rng = StdRng::seed_from_u64(ctx.seed);
        let mut chunks = Vec::with_capacity(plan.len());
        for (idx, entry) in plan.entries().iter().enumerate() {
            let sites = entry.setting.num_sites();
            let completed = self.max_completed.map_or(entry.shots, |cap| entry.shots.min(cap));
            let chunk = if entry.setting.is_randomized() {
                let shots = entry
                    .schedule
                    .iter()
                    .take(completed as usize)
                    .map(|bases| RandomizedShot {
                        bases: bases.clone(),
                        outcome: self.outcome(&mut rng, sites),
                    })
                    .collect();
                RawDatasetChunk::from_randomized(idx, sites, shots, entry.shots)
            } else {
                let mut counts = BTreeMap::new();
                for _ in 0..completed {
                    *counts.entry(self.outcome(&mut rng, sites)).or_insert(0) += 1;
                }
                RawDatasetChunk::from_counts(idx, entry.setting.clone(), counts, entry.shots)
            };
            chunks.push(chunk);
        }
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        Ok(chunks)
    }
}

/// Ways [`TamperingBackend`] corrupts the chunks of its inner backend.
#[derive(Debug, Clone, Copy)]
pub enum Tamper {
    /// First randomized shot reports a single basis.
    ShortBases,
    /// First randomized shot reports a basis the schedule never asked for.
    SwappedBases,
    /// Second chunk replaced by a copy of the first.
    DuplicateFirst,
    /// Last chunk missing.
    DropLast,
}

fn first_bases(chunks: &mut [RawDatasetChunk]) -> Option<&mut Vec<Pauli>> {
    chunks
        .first_mut()
        .and_then(|chunk| chunk.shots.first_mut())
        .map(|shot| &mut shot.bases)
}

pub struct TamperingBackend {
    pub inner: FlipBackend,
    pub tamper: Tamper,
}

impl ExecutionBackend for TamperingBackend {
    fn name(&self) -> &str {
        "tampering"
    }

    fn acquire(
        &self,
        plan: &MeasurementPlan,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawDatasetChunk>, QseError> {
        let mut chunks = self.inner.acquire(plan, ctx)?;
        match self.tamper {
            Tamper::ShortBases => {
                if let Some(bases) = first_bases(&mut chunks) {
                    bases.truncate(1);
                }
            }
            Tamper::SwappedBases => {
                if let Some(bases) = first_bases(&mut chunks) {
                    bases[0] = match bases[0] {
                        Pauli::X => Pauli::Y,
                        Pauli::Y => Pauli::Z,
                        _ => Pauli::X,
                    };
                }
            }
            Tamper::DuplicateFirst => {
                if chunks.len() > 1 {
                    chunks[1] = chunks[0].clone();
                }
            }
            Tamper::DropLast => {
                chunks.pop();
            }
        }
        Ok(chunks)
    }
}

pub fn z_observables() -> ObservableSet {
    ObservableSet::from_labels(&[("ZI", 1.0), ("IZ", 1.0), ("ZZ", 0.5)]).expect("valid labels")
}

pub fn mixed_observables() -> ObservableSet {
    ObservableSet::from_labels(&[
        ("ZI", 1.0),
        ("IZ", 1.0),
        ("ZZ", 0.5),
        ("XI", -0.5),
        ("XX", 2.0),
        ("YY", 0.25),
    ]).expect("valid labels")
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
