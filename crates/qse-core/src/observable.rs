//! Weighted multi-site Pauli observables and ordered observable sets.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QseError};

fn observable_error(code: &str, message: impl Into<String>) -> QseError {
    QseError::Configuration(ErrorInfo::new(code, message.into()))
}

/// Single-site basis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pauli {
    /// Identity; the site is not part of the observable support.
    I,
    /// Pauli X.
    X,
    /// Pauli Y.
    Y,
    /// Pauli Z.
    Z,
}

impl Pauli {
    /// The three non-identity bases, in the order randomized settings draw them.
    pub const MEASURABLE: [Pauli; 3] = [Pauli::X, Pauli::Y, Pauli::Z];

    /// Parses a single label character (`I`, `X`, `Y`, `Z`, case-insensitive).
    pub fn from_char(label: char) -> Option<Self> {
        match label.to_ascii_uppercase() {
            'I' => Some(Pauli::I),
            'X' => Some(Pauli::X),
            'Y' => Some(Pauli::Y),
            'Z' => Some(Pauli::Z),
            _ => None,
        }
    }

    /// Returns the canonical label character.
    pub fn as_char(self) -> char {
        match self {
            Pauli::I => 'I',
            Pauli::X => 'X',
            Pauli::Y => 'Y',
            Pauli::Z => 'Z',
        }
    }

    /// Returns true for the identity label.
    pub fn is_identity(self) -> bool {
        self == Pauli::I
    }
}

/// Stable identifier of an observable within an experiment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservableId(String);

impl ObservableId {
    /// Creates an identifier from any string-like value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObservableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObservableId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Immutable weighted Pauli string `coefficient * P_0 ⊗ P_1 ⊗ ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    id: ObservableId,
    paulis: Vec<Pauli>,
    coefficient: f64,
}

impl Observable {
    /// Creates a new observable, rejecting empty strings and non-finite coefficients.
    pub fn new(
        id: impl Into<ObservableId>,
        paulis: Vec<Pauli>,
        coefficient: f64,
    ) -> Result<Self, QseError> {
        let id = id.into();
        if paulis.is_empty() {
            return Err(QseError::Configuration(
                ErrorInfo::new("empty-pauli-string", "observable must act on at least one site")
                    .with_context("id", &id),
            ));
        }
        if !coefficient.is_finite() {
            return Err(QseError::Configuration(
                ErrorInfo::new("non-finite-coefficient", "coefficient must be finite")
                    .with_context("id", &id)
                    .with_context("coefficient", coefficient),
            ));
        }
        Ok(Self {
            id,
            paulis,
            coefficient,
        })
    }

    /// Parses a dense label such as `"XZIY"`; character `i` acts on site `i`.
    pub fn from_label(
        id: impl Into<ObservableId>,
        label: &str,
        coefficient: f64,
    ) -> Result<Self, QseError> {
        let paulis = label
            .chars()
            .map(|ch| {
                Pauli::from_char(ch).ok_or_else(|| {
                    QseError::Configuration(
                        ErrorInfo::new("invalid-pauli-label", "unknown basis label")
                            .with_context("label", label)
                            .with_context("char", ch),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(id, paulis, coefficient)
    }

    /// Stable identifier.
    pub fn id(&self) -> &ObservableId {
        &self.id
    }

    /// Per-site basis labels.
    pub fn paulis(&self) -> &[Pauli] {
        &self.paulis
    }

    /// Scalar real coefficient.
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Number of sites the observable is defined on.
    pub fn num_sites(&self) -> usize {
        self.paulis.len()
    }

    /// Number of non-identity sites.
    pub fn locality(&self) -> usize {
        self.paulis.iter().filter(|p| !p.is_identity()).count()
    }

    /// Iterates over `(site, basis)` pairs of the non-identity support.
    pub fn support(&self) -> impl Iterator<Item = (usize, Pauli)> + '_ {
        self.paulis
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| !p.is_identity())
    }

    /// Sites in the non-identity support, ascending.
    pub fn support_sites(&self) -> Vec<usize> {
        self.support().map(|(site, _)| site).collect()
    }

    /// Dense label, e.g. `"XZIY"`.
    pub fn label(&self) -> String {
        self.paulis.iter().map(|p| p.as_char()).collect()
    }

    /// Qubit-wise compatibility: no shared site carries two different non-identity bases.
    pub fn is_compatible_with(&self, other: &Observable) -> bool {
        self.paulis
            .iter()
            .zip(other.paulis.iter())
            .all(|(a, b)| a.is_identity() || b.is_identity() || a == b)
    }

    /// Returns true when a fixed setting measures every support site in the matching basis.
    pub fn is_measurable_in(&self, bases: &[Pauli]) -> bool {
        bases.len() == self.paulis.len()
            && self
                .support()
                .all(|(site, pauli)| bases[site] == pauli)
    }

    /// Range `[-|c|, |c|]` the expectation value is confined to.
    pub fn valid_range(&self) -> (f64, f64) {
        let bound = self.coefficient.abs();
        (-bound, bound)
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} * {}", self.id, self.coefficient, self.label())
    }
}

/// Serialized form of an [`ObservableSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableSetSpec {
    /// Site count shared by every observable.
    pub sites: usize,
    /// Observables in reporting order.
    pub observables: Vec<Observable>,
}

/// Ordered, duplicate-free collection of observables over one site count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObservableSetSpec", into = "ObservableSetSpec")]
pub struct ObservableSet {
    sites: usize,
    items: IndexMap<ObservableId, Observable>,
}

impl ObservableSet {
    /// Builds a set, rejecting empty input, mismatched site counts and duplicates.
    pub fn new(sites: usize, observables: Vec<Observable>) -> Result<Self, QseError> {
        if observables.is_empty() {
            return Err(observable_error(
                "empty-observable-set",
                "observable set must contain at least one observable",
            ));
        }
        if sites == 0 {
            return Err(observable_error("zero-sites", "site count must be positive"));
        }
        let mut items: IndexMap<ObservableId, Observable> = IndexMap::with_capacity(observables.len());
        for observable in observables {
            if observable.num_sites() != sites {
                return Err(QseError::Configuration(
                    ErrorInfo::new("site-count-mismatch", "observable site count differs from set")
                        .with_context("id", observable.id())
                        .with_context("expected", sites)
                        .with_context("actual", observable.num_sites()),
                ));
            }
            if let Some(existing) = items.values().find(|existing| {
                existing.paulis == observable.paulis
                    && existing.coefficient.to_bits() == observable.coefficient.to_bits()
            }) {
                return Err(QseError::Configuration(
                    ErrorInfo::new("duplicate-observable", "structurally identical observables")
                        .with_context("first", existing.id())
                        .with_context("second", observable.id()),
                ));
            }
            if items.contains_key(observable.id()) {
                return Err(QseError::Configuration(
                    ErrorInfo::new("duplicate-observable-id", "observable identifiers must be unique")
                        .with_context("id", observable.id()),
                ));
            }
            items.insert(observable.id().clone(), observable);
        }
        Ok(Self { sites, items })
    }

    /// Parses `(label, coefficient)` pairs, naming them `o0`, `o1`, ...
    pub fn from_labels(terms: &[(&str, f64)]) -> Result<Self, QseError> {
        let sites = terms.first().map(|(label, _)| label.len()).unwrap_or(0);
        let observables = terms
            .iter()
            .enumerate()
            .map(|(idx, (label, coeff))| Observable::from_label(format!("o{idx}"), label, *coeff))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sites, observables)
    }

    /// Number of sites.
    pub fn num_sites(&self) -> usize {
        self.sites
    }

    /// Number of observables `M`.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a constructed set; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Observable at the given reporting position.
    pub fn get(&self, index: usize) -> Option<&Observable> {
        self.items.get_index(index).map(|(_, observable)| observable)
    }

    /// Reporting position of the given identifier.
    pub fn index_of(&self, id: &ObservableId) -> Option<usize> {
        self.items.get_index_of(id)
    }

    /// Iterates in reporting order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Observable> + '_ {
        self.items.values()
    }

    /// Identifiers in reporting order.
    pub fn ids(&self) -> Vec<ObservableId> {
        self.items.keys().cloned().collect()
    }

    /// Largest locality in the set.
    pub fn max_locality(&self) -> usize {
        self.iter().map(Observable::locality).max().unwrap_or(0)
    }
}

impl TryFrom<ObservableSetSpec> for ObservableSet {
    type Error = QseError;

    fn try_from(spec: ObservableSetSpec) -> Result<Self, Self::Error> {
        ObservableSet::new(spec.sites, spec.observables)
    }
}

impl From<ObservableSet> for ObservableSetSpec {
    fn from(set: ObservableSet) -> Self {
        ObservableSetSpec {
            sites: set.sites,
            observables: set.items.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locality_counts_non_identity_sites() {
        let obs = Observable::from_label("a", "XIZY", 0.5).unwrap();
        assert_eq!(obs.locality(), 3);
        assert_eq!(obs.support_sites(), vec![0, 2, 3]);
        assert_eq!(obs.label(), "XIZY");
    }

    #[test]
    fn compatibility_is_qubit_wise() {
        let zz = Observable::from_label("zz", "ZZI", 1.0).unwrap();
        let zi = Observable::from_label("zi", "ZIX", 1.0).unwrap();
        let xz = Observable::from_label("xz", "XZI", 1.0).unwrap();
        assert!(zz.is_compatible_with(&zi));
        assert!(!zz.is_compatible_with(&xz));
        assert!(zz.is_measurable_in(&[Pauli::Z, Pauli::Z, Pauli::X]));
        assert!(!zz.is_measurable_in(&[Pauli::Z, Pauli::X, Pauli::X]));
    }

    #[test]
    fn rejects_bad_labels() {
        let err = Observable::from_label("bad", "XQ", 1.0).unwrap_err();
        assert_eq!(err.info().code, "invalid-pauli-label");
    }
}
