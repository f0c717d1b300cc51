//! Per-axis mean must be close to expected values.

use std::sync::Arc;

use super::{format_floats, record_passed, Accumulate, EventState, SensorVerification};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::statistics::RunningMoments;
use crate::stats::{SensorStats, MEAN_KEY};
use crate::types::{SensorType, TestSensorEvent};

#[derive(Debug, Default)]
struct MomentsState(RunningMoments);

impl Accumulate for MomentsState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.0.push(&event.values);
    }
}

/// Checks `|mean[axis] - expected[axis]| <= threshold[axis]` for every axis
/// in `expected`.
#[derive(Debug)]
pub struct MeanVerification {
    expected: Vec<f64>,
    threshold: Vec<f64>,
    state: EventState<MomentsState>,
}

impl MeanVerification {
    /// Mean check; `expected` and `threshold` are matched axis by axis and
    /// must have the same length, otherwise `verify` fails.
    pub fn new(expected: Vec<f64>, threshold: Vec<f64>) -> Self {
        Self {
            expected,
            threshold,
            state: EventState::default(),
        }
    }

    /// A gyroscope at rest reads zero on every axis.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        match environment.sensor().sensor_type() {
            SensorType::Gyroscope => Some(Self::new(vec![0.0; 3], vec![0.1; 3])),
            _ => None,
        }
    }
}

impl SensorVerification for MeanVerification {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        if self.expected.len() != self.threshold.len() {
            record_passed(stats, self.name(), false);
            return Err(Error::Verification(format!(
                "Mean: {} expected values but {} thresholds",
                self.expected.len(),
                self.threshold.len()
            )));
        }
        let (count, means) = self.state.with(|s| (s.0.count(), s.0.means().to_vec()));
        if count == 0 || means.len() < self.expected.len() {
            record_passed(stats, self.name(), false);
            return Err(Error::Verification(format!(
                "Mean: insufficient events, count={}, axes={}, expected axes={}",
                count,
                means.len(),
                self.expected.len()
            )));
        }

        let passed = self
            .expected
            .iter()
            .zip(&self.threshold)
            .zip(&means)
            .all(|((expected, threshold), mean)| (mean - expected).abs() <= *threshold);
        stats.add_value(MEAN_KEY, means.clone());
        record_passed(stats, self.name(), passed);

        if passed {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Mean out of range: mean={}, expected={}+/-{}",
            format_floats(&means),
            format_floats(&self.expected),
            format_floats(&self.threshold)
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.expected.clone(), self.threshold.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatValue;
    use crate::verification::test_support::{environment, events_with_values};

    #[test]
    fn still_gyroscope_passes() {
        let env = environment(SensorType::Gyroscope, 5_000);
        let verification = MeanVerification::default_for(&env).unwrap();
        verification.add_sensor_events(&events_with_values(&[[0.01, -0.02, 0.0], [-0.01, 0.02, 0.0]]));
        let mut stats = SensorStats::new();
        assert!(verification.verify(&env, &mut stats).is_ok());
        assert!(matches!(stats.value(MEAN_KEY), Some(StatValue::Floats(v)) if v.len() == 3));
    }

    #[test]
    fn rotating_gyroscope_fails() {
        let env = environment(SensorType::Gyroscope, 5_000);
        let verification = MeanVerification::default_for(&env).unwrap();
        verification.add_sensor_events(&events_with_values(&[[0.0, 0.0, 1.0]; 3]));
        let message = verification
            .verify(&env, &mut SensorStats::new())
            .unwrap_err()
            .to_string();
        assert!(message.contains("mean=[0.0000, 0.0000, 1.0000]"), "{message}");
    }

    #[test]
    fn empty_stream_fails() {
        let env = environment(SensorType::Gyroscope, 5_000);
        let verification = MeanVerification::new(vec![0.0], vec![1.0]);
        assert!(verification.verify(&env, &mut SensorStats::new()).is_err());
    }

    #[test]
    fn mismatched_thresholds_fail_instead_of_skipping_axes() {
        let env = environment(SensorType::Gyroscope, 5_000);
        let verification = MeanVerification::new(vec![0.0, 0.0, 0.0], vec![0.1]);
        verification.add_sensor_events(&events_with_values(&[[0.0, 0.0, 5.0]; 3]));
        let mut stats = SensorStats::new();
        let message = verification.verify(&env, &mut stats).unwrap_err().to_string();
        assert!(message.contains("3 expected values but 1 thresholds"), "{message}");
        assert!(stats.value(MEAN_KEY).is_none());
    }
}
