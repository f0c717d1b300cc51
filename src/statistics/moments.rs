//! Mean, variance and standard deviation.
//!
//! Verifications see events one at a time, so besides the slice helpers this
//! module provides [`RunningMoments`], a per-axis Welford accumulator that
//! never stores the stream.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population variance, or `None` for an empty slice.
pub fn variance(data: &[f64]) -> Option<f64> {
    let mean = mean(data)?;
    Some(data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64)
}

/// Population standard deviation, or `None` for an empty slice.
pub fn standard_deviation(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Streaming per-axis mean and variance (Welford's algorithm).
///
/// Each axis keeps its own sample count, so samples of differing width are
/// averaged only over the samples that carried that axis.
#[derive(Debug, Clone, Default)]
pub struct RunningMoments {
    count: u64,
    axis_counts: Vec<u64>,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningMoments {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn push(&mut self, values: &[f32]) {
        self.count += 1;
        if self.mean.len() < values.len() {
            self.axis_counts.resize(values.len(), 0);
            self.mean.resize(values.len(), 0.0);
            self.m2.resize(values.len(), 0.0);
        }
        for (axis, &value) in values.iter().enumerate() {
            self.axis_counts[axis] += 1;
            let n = self.axis_counts[axis] as f64;
            let x = f64::from(value);
            let delta = x - self.mean[axis];
            self.mean[axis] += delta / n;
            self.m2[axis] += delta * (x - self.mean[axis]);
        }
    }

    /// Samples seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Samples that carried each axis.
    pub fn axis_counts(&self) -> &[u64] {
        &self.axis_counts
    }

    /// Per-axis means.
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Per-axis population standard deviations.
    pub fn standard_deviations(&self) -> Vec<f64> {
        self.m2
            .iter()
            .zip(&self.axis_counts)
            .map(|(&m2, &n)| if n == 0 { 0.0 } else { (m2 / n as f64).sqrt() })
            .collect()
    }
}
