//! Per-axis standard deviation must stay below thresholds.

use std::sync::Arc;

use super::{format_floats, record_passed, Accumulate, EventState, SensorVerification};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::statistics::RunningMoments;
use crate::stats::{SensorStats, STANDARD_DEVIATION_KEY};
use crate::types::{SensorType, TestSensorEvent};

#[derive(Debug, Default)]
struct MomentsState(RunningMoments);

impl Accumulate for MomentsState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.0.push(&event.values);
    }
}

/// Checks `stddev[axis] <= threshold[axis]` for every thresholded axis.
#[derive(Debug)]
pub struct StandardDeviationVerification {
    threshold: Vec<f64>,
    state: EventState<MomentsState>,
}

impl StandardDeviationVerification {
    /// Spread check with one threshold per axis.
    pub fn new(threshold: Vec<f64>) -> Self {
        Self {
            threshold,
            state: EventState::default(),
        }
    }

    /// Noise limits for sensors read at rest.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        let threshold = match environment.sensor().sensor_type() {
            SensorType::Accelerometer => vec![1.0; 3],
            SensorType::MagneticField => vec![1.5; 3],
            SensorType::Gyroscope => vec![0.5; 3],
            SensorType::Pressure => vec![1.0],
            _ => return None,
        };
        Some(Self::new(threshold))
    }
}

impl SensorVerification for StandardDeviationVerification {
    fn name(&self) -> &'static str {
        "standard_deviation"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let (count, deviations) = self.state.with(|s| (s.0.count(), s.0.standard_deviations()));
        if count == 0 || deviations.len() < self.threshold.len() {
            record_passed(stats, self.name(), false);
            return Err(Error::Verification(format!(
                "Standard deviation: insufficient events, count={}, axes={}, expected axes={}",
                count,
                deviations.len(),
                self.threshold.len()
            )));
        }

        let passed = deviations
            .iter()
            .zip(&self.threshold)
            .all(|(deviation, threshold)| deviation <= threshold);
        stats.add_value(STANDARD_DEVIATION_KEY, deviations.clone());
        record_passed(stats, self.name(), passed);

        if passed {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Standard deviation out of range: stddev={}, expected<={}",
            format_floats(&deviations),
            format_floats(&self.threshold)
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.threshold.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::test_support::{environment, events_with_values};

    #[test]
    fn quiet_sensor_passes() {
        let env = environment(SensorType::MagneticField, 10_000);
        let verification = StandardDeviationVerification::default_for(&env).unwrap();
        verification.add_sensor_events(&events_with_values(&[[20.0, 5.0, -40.0], [20.5, 5.2, -40.3]]));
        assert!(verification.verify(&env, &mut SensorStats::new()).is_ok());
    }

    #[test]
    fn noisy_sensor_fails() {
        let env = environment(SensorType::Gyroscope, 5_000);
        let verification = StandardDeviationVerification::default_for(&env).unwrap();
        // x alternates -2, 2: population stddev 2.0
        verification.add_sensor_events(&events_with_values(&[
            [-2.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [-2.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
        ]));
        let mut stats = SensorStats::new();
        let message = verification.verify(&env, &mut stats).unwrap_err().to_string();
        assert!(message.contains("stddev=[2.0000, 0.0000, 0.0000]"), "{message}");
        assert!(stats.contains_key(STANDARD_DEVIATION_KEY));
    }

    #[test]
    fn light_sensor_has_no_default() {
        assert!(StandardDeviationVerification::default_for(&environment(SensorType::Light, 0)).is_none());
    }
}
