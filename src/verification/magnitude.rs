//! Mean vector norm must be close to an expected value.

use std::sync::Arc;

use super::{record_passed, Accumulate, EventState, SensorVerification};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::stats::{SensorStats, MAGNITUDE_KEY};
use crate::types::{SensorType, TestSensorEvent};

/// Standard gravity, m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

const DEFAULT_THRESHOLD: f64 = 1.5;

/// Checks `|mean(norm(values)) - expected| <= threshold`.
#[derive(Debug)]
pub struct MagnitudeVerification {
    expected: f64,
    threshold: f64,
    state: EventState<NormState>,
}

#[derive(Debug, Default)]
struct NormState {
    count: usize,
    sum: f64,
}

impl Accumulate for NormState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.sum += event.magnitude();
        self.count += 1;
    }
}

impl MagnitudeVerification {
    /// Magnitude check around `expected`.
    pub fn new(expected: f64, threshold: f64) -> Self {
        Self {
            expected,
            threshold,
            state: EventState::default(),
        }
    }

    /// Accelerometer at rest reads gravity; gyroscope at rest reads zero.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        match environment.sensor().sensor_type() {
            SensorType::Accelerometer => Some(Self::new(STANDARD_GRAVITY, DEFAULT_THRESHOLD)),
            SensorType::Gyroscope => Some(Self::new(0.0, DEFAULT_THRESHOLD)),
            _ => None,
        }
    }
}

impl SensorVerification for MagnitudeVerification {
    fn name(&self) -> &'static str {
        "magnitude"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let magnitude = self.state.with(|s| (s.count > 0).then(|| s.sum / s.count as f64));
        let Some(magnitude) = magnitude else {
            record_passed(stats, self.name(), false);
            return Err(Error::Verification("Magnitude: insufficient events, count=0".to_string()));
        };

        let passed = (magnitude - self.expected).abs() <= self.threshold;
        stats.add_value(MAGNITUDE_KEY, magnitude);
        record_passed(stats, self.name(), passed);

        if passed {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Magnitude out of range: magnitude={:.4}, expected={:.4}+/-{:.4}",
            magnitude, self.expected, self.threshold
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.expected, self.threshold))
    }
}
