use serde::{Deserialize, Serialize};

use qse_core::{ErrorInfo, ObservableSet, QseError};

use crate::greedy::Group;

/// How a shot budget is split across settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "weights", rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Same share for every setting.
    Equal,
    /// Share proportional to the largest squared coefficient served by the setting.
    MaxCoefficientSquared,
    /// Caller-supplied non-negative weights, one per setting.
    Weights(Vec<f64>),
}

/// Resolves `policy` into one weight per group.
pub fn group_weights(
    policy: &AllocationPolicy,
    groups: &[Group],
    observables: &ObservableSet,
) -> Result<Vec<f64>, QseError> {
    match policy {
        AllocationPolicy::Equal => Ok(vec![1.0; groups.len()]),
        AllocationPolicy::MaxCoefficientSquared => Ok(groups
            .iter()
            .map(|group| {
                group
                    .members
                    .iter()
                    .filter_map(|&idx| observables.get(idx))
                    .map(|obs| obs.coefficient() * obs.coefficient())
                    .fold(0.0, f64::max)
            })
            .collect()),
        AllocationPolicy::Weights(weights) => {
            if weights.len() != groups.len() {
                return Err(QseError::Configuration(
                    ErrorInfo::new("allocation-length-mismatch", "one weight per setting required")
                        .with_context("settings", groups.len())
                        .with_context("weights", weights.len()),
                ));
            }
            Ok(weights.clone())
        }
    }
}

/// Splits `budget` shots across settings in proportion to `weights`.
///
/// Uses the largest-remainder method with ties broken by lower index, so the
/// result always sums to `budget`. When the budget covers every setting, each
/// gets at least one shot and only the surplus is split by weight. All-zero
/// weights fall back to an equal split.
pub fn allocate_shots(budget: u64, weights: &[f64]) -> Result<Vec<u64>, QseError> {
    if weights.is_empty() {
        return Err(QseError::config("empty-allocation", "no settings to allocate shots to"));
    }
    if let Some((idx, bad)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(QseError::Configuration(
            ErrorInfo::new("invalid-weight", "allocation weights must be finite and non-negative")
                .with_context("index", idx)
                .with_context("weight", bad),
        ));
    }
    let total_weight: f64 = weights.iter().sum();
    let weights: Vec<f64> = if total_weight > 0.0 {
        weights.iter().map(|w| w / total_weight).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    };

    let settings = weights.len() as u64;
    let (floor, surplus) = if budget >= settings {
        (1, budget - settings)
    } else {
        (0, budget)
    };

    let mut shots = vec![floor; weights.len()];
    let mut remainders = Vec::with_capacity(weights.len());
    let mut assigned = 0u64;
    for (idx, share) in weights.iter().enumerate() {
        let quota = share * surplus as f64;
        let whole = quota.floor() as u64;
        shots[idx] += whole;
        assigned += whole;
        remainders.push((idx, quota - whole as f64));
    }
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let leftover = surplus.saturating_sub(assigned) as usize;
    for &(idx, _) in remainders.iter().cycle().take(leftover) {
        shots[idx] += 1;
    }
    Ok(shots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_largest_fraction() {
        let shots = allocate_shots(10, &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(shots, vec![4, 3, 3]);
    }

    #[test]
    fn small_budget_gives_each_setting_one_shot_first() {
        let shots = allocate_shots(4, &[100.0, 0.0, 0.0]).unwrap();
        assert_eq!(shots, vec![2, 1, 1]);
    }

    #[test]
    fn budget_below_setting_count_uses_weights() {
        let shots = allocate_shots(1, &[1.0, 3.0]).unwrap();
        assert_eq!(shots, vec![0, 1]);
    }
}
