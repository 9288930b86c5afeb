#![deny(missing_docs)]

//! Per-shot reconstruction, robust averaging, readout-noise correction,
//! confidence intervals and family-wise error control.

pub mod config;
pub mod estimate;
pub mod fwer;
pub mod interval;
pub mod moments;
pub mod readout;
pub mod reconstruct;
pub mod robust;

pub use config::{validate_confidence_level, EstimatorConfig};
pub use estimate::{estimate_observable, Diagnostics, Estimates, ObservableEstimate};
pub use fwer::{simultaneous_intervals, FwerMethod, FwerSpec, SimultaneousIntervals};
pub use interval::{normal_quantile, ConfidenceInterval, IntervalMethod, IntervalModel};
pub use moments::{kurtosis_ratio, median, percentile, SampleMoments};
pub use readout::{ParityWeights, ReadoutCorrection};
pub use reconstruct::{direct_value, shadow_value, ObservableAccumulator};
pub use robust::{choose_blocks, median_of_means, BlockPolicy, MedianOfMeans};
