//! Statistical helpers used by the sensor verifications.
//!
//! This module provides:
//! - Quantile computation using efficient O(n) selection algorithms
//! - Mean, variance and standard deviation, including a streaming accumulator
//! - Timestamp deltas, event frequency and jitter

mod moments;
mod quantile;
mod timing;

pub use moments::{mean, standard_deviation, variance, RunningMoments};
pub use quantile::{compute_quantile, quantile_of};
pub use timing::{
    frequency_from_span, frequency_hz, jitter_95th_percentile_ns, jitter_values, timestamp_deltas,
};
