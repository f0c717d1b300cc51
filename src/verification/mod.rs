//! Statistical checks over streams of sensor events.
//!
//! A verification is fed events as they arrive (usually from the callback
//! thread of a [`ValidatingSensorEventListener`](crate::listener::ValidatingSensorEventListener))
//! and evaluated once, after collection, with [`SensorVerification::verify`].
//!
//! # Verifications
//!
//! - **Event ordering**: timestamps strictly increase
//! - **Event gap**: no delta exceeds a multiple of the expected period
//! - **Frequency**: average rate within bounds
//! - **Jitter**: 95th percentile timestamp jitter below a percentage of the period
//! - **Magnitude**: mean vector norm near an expected value
//! - **Mean**: per-axis mean near expected values
//! - **Standard deviation**: per-axis spread below thresholds
//!
//! Every kind has a `default_for(environment)` factory deriving thresholds
//! from the environment; it returns `None` when the check does not apply to
//! the sensor.

mod event_gap;
mod event_ordering;
mod frequency;
mod jitter;
mod magnitude;
mod mean;
mod standard_deviation;

pub use event_gap::EventGapVerification;
pub use event_ordering::EventOrderingVerification;
pub use frequency::FrequencyVerification;
pub use jitter::JitterVerification;
pub use magnitude::MagnitudeVerification;
pub use mean::MeanVerification;
pub use standard_deviation::StandardDeviationVerification;

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::environment::TestSensorEnvironment;
use crate::error::Result;
use crate::stats::SensorStats;
use crate::sync::lock;
use crate::types::TestSensorEvent;

/// Most offending positions listed in a failure message.
pub const MAX_REPORTED_POSITIONS: usize = 50;

/// A check run over every event a sensor delivered.
///
/// Events must be added in the order they were received; `verify` is called
/// once, after the last event.
pub trait SensorVerification: Send + Sync + fmt::Debug {
    /// Stats key prefix, e.g. `event_gap`.
    fn name(&self) -> &'static str;

    /// Add one event.
    fn add_sensor_event(&self, event: &TestSensorEvent);

    /// Add several events atomically with respect to other writers.
    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        for event in events {
            self.add_sensor_event(event);
        }
    }

    /// Evaluate the added events, recording supporting values in `stats`.
    ///
    /// Fails with [`Error::Verification`](crate::Error::Verification).
    fn verify(&self, environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()>;

    /// A verification with the same thresholds and no events.
    fn clone_verification(&self) -> Arc<dyn SensorVerification>;
}

/// Running state of a verification, folded one event at a time.
pub(crate) trait Accumulate: Default + Send {
    fn accumulate(&mut self, event: &TestSensorEvent);
}

/// Mutex-guarded accumulator shared by all verification kinds.
#[derive(Debug, Default)]
pub(crate) struct EventState<S> {
    state: Mutex<S>,
}

impl<S: Accumulate> EventState<S> {
    pub(crate) fn add(&self, event: &TestSensorEvent) {
        lock(&self.state).accumulate(event);
    }

    pub(crate) fn add_all(&self, events: &[TestSensorEvent]) {
        let mut state = lock(&self.state);
        for event in events {
            state.accumulate(event);
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.state))
    }
}

/// Position of an offending event and the timestamp it was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedEventPair {
    /// Index of the event in the stream.
    pub index: usize,
    /// Timestamp of the reference (previous) event.
    pub previous_timestamp: i64,
    /// Timestamp of the event.
    pub timestamp: i64,
}

impl fmt::Display for IndexedEventPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({}, {})", self.index, self.previous_timestamp, self.timestamp)
    }
}

pub(crate) fn record_passed(stats: &mut SensorStats, name: &str, passed: bool) {
    stats.add_value(format!("{name}_passed"), passed);
}

pub(crate) fn format_floats(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

/// Every default verification that applies to `environment`.
pub fn default_verifications(environment: &TestSensorEnvironment) -> Vec<Arc<dyn SensorVerification>> {
    let candidates: [Option<Arc<dyn SensorVerification>>; 7] = [
        EventGapVerification::default_for(environment).map(|v| Arc::new(v) as _),
        EventOrderingVerification::default_for(environment).map(|v| Arc::new(v) as _),
        FrequencyVerification::default_for(environment).map(|v| Arc::new(v) as _),
        JitterVerification::default_for(environment).map(|v| Arc::new(v) as _),
        MagnitudeVerification::default_for(environment).map(|v| Arc::new(v) as _),
        MeanVerification::default_for(environment).map(|v| Arc::new(v) as _),
        StandardDeviationVerification::default_for(environment).map(|v| Arc::new(v) as _),
    ];
    candidates.into_iter().flatten().collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::environment::TestSensorEnvironment;
    use crate::simulated::SimulatedSensorManager;
    use crate::types::{Sensor, SensorType, TestSensorEvent};

    pub(crate) fn environment(sensor_type: SensorType, period_us: u32) -> TestSensorEnvironment {
        let sensor = Sensor::new(1, "test-sensor", sensor_type).min_delay_us(period_us);
        TestSensorEnvironment::new(SimulatedSensorManager::new(), sensor)
    }

    pub(crate) fn events_at(timestamps: &[i64]) -> Vec<TestSensorEvent> {
        timestamps
            .iter()
            .map(|&ts| TestSensorEvent::new(1, ts, vec![0.0, 0.0, 0.0], 3))
            .collect()
    }

    pub(crate) fn events_with_values(values: &[[f32; 3]]) -> Vec<TestSensorEvent> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TestSensorEvent::new(1, i as i64 * 1_000_000, v.to_vec(), 3))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::environment;
    use super::*;
    use crate::types::{ReportingMode, Sensor, SensorType};
    use crate::simulated::SimulatedSensorManager;

    #[test]
    fn continuous_accelerometer_gets_every_timing_check() {
        let env = environment(SensorType::Accelerometer, 10_000);
        let names: Vec<&str> = default_verifications(&env).iter().map(|v| v.name()).collect();
        assert_eq!(
            names,
            vec![
                "event_gap",
                "event_out_of_order",
                "frequency",
                "jitter",
                "magnitude",
                "standard_deviation"
            ]
        );
    }

    #[test]
    fn on_change_sensor_only_gets_ordering() {
        let sensor = Sensor::new(4, "light", SensorType::Light)
            .reporting_mode(ReportingMode::OnChange);
        let env = TestSensorEnvironment::new(SimulatedSensorManager::new(), sensor);
        let names: Vec<&str> = default_verifications(&env).iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["event_out_of_order"]);
    }

    #[test]
    fn indexed_pair_display() {
        let pair = IndexedEventPair {
            index: 2,
            previous_timestamp: 150,
            timestamp: 140,
        };
        assert_eq!(pair.to_string(), "2:(150, 140)");
    }
}
