//! Dense statevector backend used for scenario tests and benchmarks.
//!
//! The backend samples a fixed pure state in the requested local bases and
//! can apply simulated readout flips. It also answers exact expectation
//! values, so one instance serves as both execution backend and truth oracle.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::FRAC_1_SQRT_2;

use log::debug;
use nalgebra::Complex;
use rand::Rng;

use qse_core::{
    AcquireContext, Bitstring, ErrorInfo, ExecutionBackend, MeasurementPlan, NoiseDescriptor,
    Observable, Pauli, PlanEntry, QseError, RandomizedShot, RawDatasetChunk, RngHandle, TruthOracle,
    TruthValue,
};

/// Largest register the dense simulation accepts.
pub const MAX_SITES: usize = 12;

type Amplitude = Complex<f64>;
type Gate = [[Amplitude; 2]; 2];

/// Pure state over at most [`MAX_SITES`] sites, indexed little-endian.
#[derive(Debug, Clone)]
pub struct StatevectorBackend {
    sites: usize,
    amplitudes: Vec<Amplitude>,
    readout: Option<NoiseDescriptor>,
    shot_cap: Option<u64>,
}

impl StatevectorBackend {
    /// Builds a backend from raw amplitudes, normalizing them.
    pub fn from_amplitudes(sites: usize, amplitudes: Vec<Amplitude>) -> Result<Self, QseError> {
        if sites == 0 || sites > MAX_SITES {
            return Err(QseError::Configuration(
                ErrorInfo::new("unsupported-register", "statevector sites must lie in 1..=12")
                    .with_context("sites", sites),
            ));
        }
        if amplitudes.len() != 1usize << sites {
            return Err(QseError::Configuration(
                ErrorInfo::new("amplitude-length", "amplitude count must be 2^sites")
                    .with_context("sites", sites)
                    .with_context("actual", amplitudes.len()),
            ));
        }
        let norm = amplitudes.iter().map(|amp| amp.norm_sqr()).sum::<f64>().sqrt();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(QseError::config("zero-state", "state vector must have a positive norm"));
        }
        Ok(Self {
            sites,
            amplitudes: amplitudes.into_iter().map(|amp| amp / norm).collect(),
            readout: None,
            shot_cap: None,
        })
    }

    /// `|0...0>` on `sites` sites.
    pub fn product_zero(sites: usize) -> Result<Self, QseError> {
        let dim = 1usize << sites.min(MAX_SITES + 1);
        let mut amplitudes = vec![Amplitude::new(0.0, 0.0); dim];
        amplitudes[0] = Amplitude::new(1.0, 0.0);
        Self::from_amplitudes(sites, amplitudes)
    }

    /// `(|0...0> + |1...1>) / sqrt(2)` on `sites` sites.
    pub fn ghz(sites: usize) -> Result<Self, QseError> {
        let dim = 1usize << sites.min(MAX_SITES + 1);
        let mut amplitudes = vec![Amplitude::new(0.0, 0.0); dim];
        amplitudes[0] = Amplitude::new(FRAC_1_SQRT_2, 0.0);
        amplitudes[dim - 1] = Amplitude::new(FRAC_1_SQRT_2, 0.0);
        Self::from_amplitudes(sites, amplitudes)
    }

    /// Two-site Bell state `(|00> + |11>) / sqrt(2)`.
    pub fn bell_pair() -> Self {
        let h = Amplitude::new(FRAC_1_SQRT_2, 0.0);
        let zero = Amplitude::new(0.0, 0.0);
        Self {
            sites: 2,
            amplitudes: vec![h, zero, zero, h],
            readout: None,
            shot_cap: None,
        }
    }

    /// Applies simulated readout flips described by `noise` to every shot.
    pub fn with_readout(mut self, noise: NoiseDescriptor) -> Result<Self, QseError> {
        noise.validate(self.sites)?;
        self.readout = Some(noise);
        Ok(self)
    }

    /// Completes at most `cap` shots per plan entry, reporting the rest as missing.
    pub fn with_shot_cap(mut self, cap: u64) -> Self {
        self.shot_cap = Some(cap);
        self
    }

    /// Number of sites.
    pub fn num_sites(&self) -> usize {
        self.sites
    }

    /// Exact `<psi| P |psi>` for one Pauli string, without any coefficient.
    ///
    /// Returns `None` when the string does not cover exactly the register.
    pub fn pauli_expectation(&self, paulis: &[Pauli]) -> Option<f64> {
        if paulis.len() != self.sites {
            return None;
        }
        let flip_mask = paulis
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p, Pauli::X | Pauli::Y))
            .fold(0usize, |mask, (site, _)| mask | (1 << site));
        let mut total = Amplitude::new(0.0, 0.0);
        for (index, amp) in self.amplitudes.iter().enumerate() {
            let mut phase = Amplitude::new(1.0, 0.0);
            for (site, pauli) in paulis.iter().enumerate() {
                let bit = (index >> site) & 1 == 1;
                phase *= match (pauli, bit) {
                    (Pauli::Y, false) => Amplitude::new(0.0, 1.0),
                    (Pauli::Y, true) => Amplitude::new(0.0, -1.0),
                    (Pauli::Z, true) => Amplitude::new(-1.0, 0.0),
                    _ => Amplitude::new(1.0, 0.0),
                };
            }
            total += self.amplitudes[index ^ flip_mask].conj() * phase * amp;
        }
        Some(total.re)
    }

    /// Cumulative outcome distribution after rotating each site into `bases`.
    fn cumulative(&self, bases: &[Pauli]) -> Vec<f64> {
        let mut state = self.amplitudes.clone();
        for (site, basis) in bases.iter().enumerate() {
            if let Some(gate) = rotation(*basis) {
                apply_gate(&mut state, site, &gate);
            }
        }
        let mut acc = 0.0;
        state
            .iter()
            .map(|amp| {
                acc += amp.norm_sqr();
                acc
            })
            .collect()
    }

    fn sample(&self, cumulative: &[f64], rng: &mut RngHandle) -> usize {
        let total = cumulative.last().copied().unwrap_or(1.0);
        let draw = rng.gen::<f64>() * total;
        let ideal = cumulative
            .partition_point(|&c| c <= draw)
            .min(cumulative.len() - 1);
        self.apply_readout(ideal, rng)
    }

    fn apply_readout(&self, outcome: usize, rng: &mut RngHandle) -> usize {
        match &self.readout {
            None => outcome,
            Some(NoiseDescriptor::Joint { matrix, .. }) => {
                let draw = rng.gen::<f64>();
                let mut acc = 0.0;
                for (measured, row) in matrix.iter().enumerate() {
                    acc += row.get(outcome).copied().unwrap_or(0.0);
                    if draw < acc {
                        return measured;
                    }
                }
                outcome
            }
            Some(noise) => (0..self.sites).fold(outcome, |value, site| {
                let Some(confusion) = noise.site(site) else {
                    return value;
                };
                let bit = (value >> site) & 1 == 1;
                let flip = if bit { confusion.p0_given_1 } else { confusion.p1_given_0 };
                if flip > 0.0 && rng.gen::<f64>() < flip {
                    value ^ (1 << site)
                } else {
                    value
                }
            }),
        }
    }

    fn allowed(&self, requested: u64) -> u64 {
        self.shot_cap.map_or(requested, |cap| requested.min(cap))
    }

    fn run_fixed(
        &self,
        index: usize,
        entry: &PlanEntry,
        bases: &[Pauli],
        rng: &mut RngHandle,
    ) -> RawDatasetChunk {
        let cumulative = self.cumulative(bases);
        let mut tallies: BTreeMap<usize, u64> = BTreeMap::new();
        for _ in 0..self.allowed(entry.shots) {
            *tallies.entry(self.sample(&cumulative, rng)).or_insert(0) += 1;
        }
        let counts = tallies
            .into_iter()
            .map(|(outcome, count)| (Bitstring::from_index(outcome, self.sites), count))
            .collect();
        RawDatasetChunk::from_counts(index, entry.setting.clone(), counts, entry.shots)
    }

    fn run_randomized(
        &self,
        index: usize,
        entry: &PlanEntry,
        rng: &mut RngHandle,
    ) -> RawDatasetChunk {
        let mut cache: HashMap<&[Pauli], Vec<f64>> = HashMap::new();
        let allowed = self.allowed(entry.shots) as usize;
        let shots = entry
            .schedule
            .iter()
            .take(allowed)
            .map(|bases| {
                let cumulative = cache
                    .entry(bases.as_slice())
                    .or_insert_with(|| self.cumulative(bases));
                let outcome = self.sample(cumulative.as_slice(), rng);
                RandomizedShot {
                    bases: bases.clone(),
                    outcome: Bitstring::from_index(outcome, self.sites),
                }
            })
            .collect();
        RawDatasetChunk::from_randomized(index, self.sites, shots, entry.shots)
    }
}

fn rotation(basis: Pauli) -> Option<Gate> {
    let h = Amplitude::new(FRAC_1_SQRT_2, 0.0);
    match basis {
        Pauli::X => Some([[h, h], [h, -h]]),
        // H * S^dagger
        Pauli::Y => {
            let i = Amplitude::new(0.0, FRAC_1_SQRT_2);
            Some([[h, -i], [h, i]])
        }
        Pauli::I | Pauli::Z => None,
    }
}

fn apply_gate(state: &mut [Amplitude], site: usize, gate: &Gate) {
    let bit = 1usize << site;
    for index in 0..state.len() {
        if index & bit != 0 {
            continue;
        }
        let (a, b) = (state[index], state[index | bit]);
        state[index] = gate[0][0] * a + gate[0][1] * b;
        state[index | bit] = gate[1][0] * a + gate[1][1] * b;
    }
}

impl ExecutionBackend for StatevectorBackend {
    fn name(&self) -> &str {
        "statevector"
    }

    fn acquire(
        &self,
        plan: &MeasurementPlan,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawDatasetChunk>, QseError> {
        if ctx.expired() {
            return Err(QseError::backend("deadline-expired", "deadline passed before acquisition"));
        }
        let chunks: Vec<RawDatasetChunk> = plan
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.setting.num_sites() != self.sites {
                    return RawDatasetChunk::failed(
                        index,
                        entry.setting.clone(),
                        entry.shots,
                        "setting does not match the register size",
                    );
                }
                let mut rng = RngHandle::substream(ctx.seed, index as u64);
                match entry.setting.fixed_bases() {
                    Some(bases) => self.run_fixed(index, entry, bases, &mut rng),
                    None => self.run_randomized(index, entry, &mut rng),
                }
            })
            .collect();
        debug!(
            "statevector round {} sampled {} settings",
            ctx.round,
            chunks.len()
        );
        Ok(chunks)
    }
}

impl TruthOracle for StatevectorBackend {
    fn truth(&self, observable: &Observable) -> Option<TruthValue> {
        self.pauli_expectation(observable.paulis())
            .map(|value| TruthValue::exact(observable.coefficient() * value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_expectations() {
        let backend = StatevectorBackend::bell_pair();
        let expect = |paulis: &[Pauli]| backend.pauli_expectation(paulis).unwrap();
        assert!((expect(&[Pauli::Z, Pauli::Z]) - 1.0).abs() < 1e-12);
        assert!((expect(&[Pauli::X, Pauli::X]) - 1.0).abs() < 1e-12);
        assert!((expect(&[Pauli::Y, Pauli::Y]) + 1.0).abs() < 1e-12);
        assert!(expect(&[Pauli::Z, Pauli::I]).abs() < 1e-12);
        assert!(backend.pauli_expectation(&[Pauli::Z]).is_none());
    }

    #[test]
    fn y_rotation_maps_plus_i_to_zero() {
        let backend = StatevectorBackend::from_amplitudes(
            1,
            vec![Amplitude::new(1.0, 0.0), Amplitude::new(0.0, 1.0)],
        )
        .unwrap();
        let cumulative = backend.cumulative(&[Pauli::Y]);
        assert!((cumulative[0] - 1.0).abs() < 1e-12);
        assert!((backend.pauli_expectation(&[Pauli::Y]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn expired_deadline_is_a_backend_error() {
        let backend = StatevectorBackend::bell_pair();
        let observables = qse_core::ObservableSet::from_labels(&[("ZZ", 1.0)]).unwrap();
        let plan = MeasurementPlan::new(
            vec![PlanEntry::fixed(vec![Pauli::Z, Pauli::Z], 10, vec![0])],
            &observables,
        )
        .unwrap();
        let ctx = AcquireContext {
            seed: 1,
            deadline: Some(std::time::Instant::now() - std::time::Duration::from_millis(1)),
            round: 0,
        };
        let err = backend.acquire(&plan, &ctx).unwrap_err();
        assert!(matches!(err, QseError::Backend(_)));
        assert_eq!(err.info().code, "deadline-expired");
    }

    #[test]
    fn rejects_oversized_registers() {
        assert!(StatevectorBackend::product_zero(MAX_SITES + 1).is_err());
        assert!(StatevectorBackend::ghz(3).is_ok());
    }
}
