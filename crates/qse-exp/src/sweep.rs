//! Protocol × budget × replicate sweeps.
//!
//! Every triple gets its own protocol instance and a seed derived from the
//! master seed and the triple's indices. Triples run on a bounded worker
//! pool and are re-ordered by index afterwards, so the report does not
//! depend on the pool size.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use qse_bench::{
    lookup_truths, records_for_triple, worst_case_n_star, BenchmarkRecord, NStar, SeriesPoint,
    ShotSeries, TripleKey,
};
use qse_core::{
    triple_seed, ErrorInfo, ExecutionBackend, QseError, RunProvenance, SchemaVersion, TruthOracle,
    TruthValue,
};
use qse_est::{Estimates, FwerSpec};
use qse_proto::{
    execute, initialize, ExecutionOptions, ExecutionOutcome, ProtocolKind, RoundRecord, RunStatus,
};

use crate::config::SweepConfig;
use crate::hash::stable_hash_string;

/// Summary of one (protocol, budget, replicate) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleReport {
    /// Protocol executed.
    pub protocol: ProtocolKind,
    /// Protocol position in the configuration.
    pub protocol_index: usize,
    /// Position of the budget in the resolved grid.
    pub grid_index: usize,
    /// Shot budget.
    pub n_shots: u64,
    /// Replicate index.
    pub replicate: usize,
    /// Seed derived for the triple.
    pub seed: u64,
    /// Outcome status.
    pub status: RunStatus,
    /// Shots folded into the estimates.
    pub shots_used: u64,
    /// Round history.
    pub rounds: Vec<RoundRecord>,
    /// Classical compute time.
    pub compute_seconds: f64,
    /// Error that failed or cut the run short.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<QseError>,
    /// Final estimates, absent when the run produced none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimates: Option<Estimates>,
}

/// Worst-case N* of one protocol replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolNStar {
    /// Protocol.
    pub protocol: ProtocolKind,
    /// Replicate index.
    pub replicate: usize,
    /// Result over the replicate's usable grid points.
    pub n_star: NStar,
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Hash of the canonical configuration.
    pub config_hash: String,
    /// Provenance block.
    pub provenance: RunProvenance,
    /// Resolved shot grid.
    pub grid: Vec<u64>,
    /// One entry per triple, protocol-major then grid then replicate.
    pub triples: Vec<TripleReport>,
    /// One row per (triple, observable), in triple order.
    pub records: Vec<BenchmarkRecord>,
    /// Worst-case N* per protocol replicate when both ε and an FWER spec are configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub n_star: Vec<ProtocolNStar>,
}

impl SweepReport {
    /// Triples with the given status.
    pub fn count_status(&self, status: RunStatus) -> usize {
        self.triples
            .iter()
            .filter(|triple| triple.status == status)
            .count()
    }

    /// Series of one protocol replicate over every grid point that produced estimates.
    pub fn series(&self, protocol: ProtocolKind, replicate: usize) -> Result<ShotSeries, QseError> {
        let mut triples: Vec<&TripleReport> = self
            .triples
            .iter()
            .filter(|triple| triple.protocol == protocol && triple.replicate == replicate)
            .filter(|triple| triple.status != RunStatus::Failed)
            .collect();
        triples.sort_by_key(|triple| triple.grid_index);
        let points = triples
            .into_iter()
            .filter_map(|triple| {
                triple.estimates.as_ref().map(|estimates| SeriesPoint {
                    n: triple.n_shots,
                    shots_used: triple.shots_used,
                    compute_seconds: triple.compute_seconds,
                    estimates: estimates.clone(),
                })
            })
            .collect();
        ShotSeries::new(protocol.as_str(), points)
    }
}

struct TripleJob {
    protocol: ProtocolKind,
    key: TripleKey,
}

fn enumerate_triples(config: &SweepConfig, grid: &[u64]) -> Vec<TripleJob> {
    let mut jobs = Vec::with_capacity(config.protocols.len() * grid.len() * config.replicates);
    for (protocol_index, &protocol) in config.protocols.iter().enumerate() {
        for (grid_index, &n_shots) in grid.iter().enumerate() {
            for replicate in 0..config.replicates {
                jobs.push(TripleJob {
                    protocol,
                    key: TripleKey {
                        protocol: protocol.as_str().to_string(),
                        protocol_index,
                        grid_index,
                        n_shots,
                        replicate,
                        seed: triple_seed(config.seed, protocol_index, grid_index, replicate),
                    },
                });
            }
        }
    }
    jobs
}

/// Runs one triple; the caller turns errors into a failed report.
fn run_triple(
    config: &SweepConfig,
    backend: &dyn ExecutionBackend,
    job: &TripleJob,
) -> Result<ExecutionOutcome, QseError> {
    let mut protocol = initialize(
        job.protocol,
        config.observables.clone(),
        config.protocol_config(job.key.n_shots),
        &config.protocol_context(),
        job.key.seed,
    )?;
    let mut options = ExecutionOptions::seeded(job.key.seed);
    options.deadline = config
        .deadline_seconds
        .map(|seconds| Instant::now() + Duration::from_secs_f64(seconds));
    execute(protocol.as_mut(), backend, &options)
}

fn triple_report(job: &TripleJob, result: Result<ExecutionOutcome, QseError>) -> TripleReport {
    let key = &job.key;
    let base = TripleReport {
        protocol: job.protocol,
        protocol_index: key.protocol_index,
        grid_index: key.grid_index,
        n_shots: key.n_shots,
        replicate: key.replicate,
        seed: key.seed,
        status: RunStatus::Failed,
        shots_used: 0,
        rounds: Vec::new(),
        compute_seconds: 0.0,
        failure: None,
        estimates: None,
    };
    match result {
        Ok(outcome) => {
            if let Some(failure) = &outcome.failure {
                warn!(
                    "{} at n={} replicate {} ended early: {failure}",
                    job.protocol, key.n_shots, key.replicate
                );
            }
            TripleReport {
                status: outcome.status,
                shots_used: outcome.shots_used(),
                compute_seconds: outcome.compute_seconds,
                estimates: (outcome.status != RunStatus::Failed).then_some(outcome.estimates),
                rounds: outcome.rounds,
                failure: outcome.failure,
                ..base
            }
        }
        Err(err) => {
            warn!(
                "{} at n={} replicate {} failed: {err}",
                job.protocol, key.n_shots, key.replicate
            );
            TripleReport {
                failure: Some(err),
                ..base
            }
        }
    }
}

fn tool_versions() -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    versions.insert("qse-exp".to_string(), env!("CARGO_PKG_VERSION").to_string());
    versions
}

/// Runs the full sweep against `backend`.
///
/// Only configuration errors are returned; every other failure is contained
/// in its triple, which still emits one record per observable.
pub fn run_sweep(
    config: &SweepConfig,
    backend: &dyn ExecutionBackend,
    truth: Option<&dyn TruthOracle>,
) -> Result<SweepReport, QseError> {
    config.validate()?;
    let grid = config.grid.resolve()?;
    let config_hash = config.config_hash()?;
    let provenance = RunProvenance {
        schema_version: SchemaVersion::default(),
        config_hash: config_hash.clone(),
        observables_hash: stable_hash_string(&config.observables)?,
        seed: config.seed,
        tool_versions: tool_versions(),
    };
    let truths: Vec<Option<TruthValue>> = match truth {
        Some(oracle) => lookup_truths(&config.observables, oracle),
        None => vec![None; config.observables.len()],
    };
    let jobs = enumerate_triples(config, &grid);
    info!(
        "sweep {} starting: {} protocols x {} budgets x {} replicates on {} ({} workers)",
        &config_hash[..12],
        config.protocols.len(),
        grid.len(),
        config.replicates,
        backend.name(),
        config.scheduler.parallelism
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.scheduler.parallelism.max(1))
        .build()
        .map_err(|err| {
            QseError::Configuration(ErrorInfo::new("thread-pool", err.to_string()))
        })?;
    let mut results: Vec<(usize, TripleReport, Vec<BenchmarkRecord>)> = pool.install(|| {
        jobs.par_iter()
            .enumerate()
            .map(|(index, job)| {
                let result = run_triple(config, backend, job);
                let records = records_for_triple(
                    &job.key,
                    &config.observables,
                    result.as_ref().ok(),
                    &truths,
                );
                (index, triple_report(job, result), records)
            })
            .collect()
    });
    results.sort_by_key(|(index, _, _)| *index);

    let mut triples = Vec::with_capacity(results.len());
    let mut records = Vec::with_capacity(results.len() * config.observables.len());
    for (_, triple, triple_records) in results {
        triples.push(triple);
        records.extend(triple_records);
    }
    let mut report = SweepReport {
        config_hash,
        provenance,
        grid,
        triples,
        records,
        n_star: Vec::new(),
    };
    if let (Some(epsilon), Some(fwer)) = (config.epsilon, config.fwer.as_ref()) {
        report.n_star = summarize_n_star(&report, config, epsilon, fwer);
    }
    info!(
        "sweep {} finished: {} success, {} partial, {} failed",
        &report.config_hash[..12],
        report.count_status(RunStatus::Success),
        report.count_status(RunStatus::Partial),
        report.count_status(RunStatus::Failed)
    );
    Ok(report)
}

fn summarize_n_star(
    report: &SweepReport,
    config: &SweepConfig,
    epsilon: f64,
    fwer: &FwerSpec,
) -> Vec<ProtocolNStar> {
    let mut summary = Vec::new();
    for &protocol in &config.protocols {
        for replicate in 0..config.replicates {
            let n_star = report
                .series(protocol, replicate)
                .and_then(|series| worst_case_n_star(&series, epsilon, fwer));
            match n_star {
                Ok(n_star) => summary.push(ProtocolNStar {
                    protocol,
                    replicate,
                    n_star,
                }),
                Err(err) => warn!("no N* for {protocol} replicate {replicate}: {err}"),
            }
        }
    }
    summary
}
