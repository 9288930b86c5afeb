//! Reference values for tasks that compare estimates against truth.

use qse_core::{ErrorInfo, ObservableSet, QseError, TruthOracle, TruthValue};
use qse_est::Estimates;

/// Looks up every observable; unknown truths stay `None`.
pub fn lookup_truths(observables: &ObservableSet, oracle: &dyn TruthOracle) -> Vec<Option<TruthValue>> {
    observables.iter().map(|observable| oracle.truth(observable)).collect()
}

/// Like [`lookup_truths`] but fails on the first observable without a reference value.
pub fn require_truths(
    observables: &ObservableSet,
    oracle: &dyn TruthOracle,
) -> Result<Vec<TruthValue>, QseError> {
    observables
        .iter()
        .map(|observable| {
            oracle.truth(observable).ok_or_else(|| {
                QseError::Configuration(
                    ErrorInfo::new("missing-truth", "task requires a reference value per observable")
                        .with_context("observable", observable.id()),
                )
            })
        })
        .collect()
}

pub(crate) fn check_truths(estimates: &Estimates, truths: &[TruthValue]) -> Result<(), QseError> {
    if estimates.len() == truths.len() {
        Ok(())
    } else {
        Err(QseError::Configuration(
            ErrorInfo::new("missing-truth", "one reference value per observable required")
                .with_context("observables", estimates.len())
                .with_context("truths", truths.len()),
        ))
    }
}
