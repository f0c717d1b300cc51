use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{begin_execution, OperationPlan};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::helpers::format_assertion_message;
use crate::listener::{TestListener, ValidatingSensorEventListener};
use crate::manager::TestSensorManager;
use crate::stats::{SensorStats, ERROR, SENSOR_NAME_KEY};
use crate::sync::CancellationToken;
use crate::verification::{default_verifications, SensorVerification};

/// What a leaf collects before verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Wait until this many events arrived.
    EventCount(usize),
    /// Collect for a fixed duration.
    Duration(Duration),
    /// Collect for a fixed duration, then flush and wait for completion.
    DurationThenFlush(Duration),
}

/// Leaf operation: run the sensor, then evaluate every attached verification.
///
/// All verification failures are reported together:
///
/// ```text
/// VerifySensorOperation | sensor='accel', samplingPeriod=0us, maxReportLatency=0us | Out of order events: ..., Frequency out of range: ...
/// ```
#[derive(Debug)]
pub struct VerifiableSensorOperation {
    environment: Arc<TestSensorEnvironment>,
    mode: CollectionMode,
    verifications: Vec<Arc<dyn SensorVerification>>,
    log_events: bool,
    stats: SensorStats,
    executed: bool,
}

impl VerifiableSensorOperation {
    /// Leaf collecting in `mode`.
    pub fn new(environment: Arc<TestSensorEnvironment>, mode: CollectionMode) -> Self {
        Self {
            environment,
            mode,
            verifications: Vec::new(),
            log_events: false,
            stats: SensorStats::new(),
            executed: false,
        }
    }

    /// Leaf waiting for `count` events.
    pub fn events(environment: Arc<TestSensorEnvironment>, count: usize) -> Self {
        Self::new(environment, CollectionMode::EventCount(count))
    }

    /// Leaf collecting for `duration`.
    pub fn duration(environment: Arc<TestSensorEnvironment>, duration: Duration) -> Self {
        Self::new(environment, CollectionMode::Duration(duration))
    }

    /// Leaf collecting for `duration`, then flushing.
    pub fn flush_after(environment: Arc<TestSensorEnvironment>, duration: Duration) -> Self {
        Self::new(environment, CollectionMode::DurationThenFlush(duration))
    }

    /// Attach a verification.
    pub fn with_verification(mut self, verification: Arc<dyn SensorVerification>) -> Self {
        self.add_verification(verification);
        self
    }

    /// Attach every default verification applicable to the environment.
    pub fn with_default_verifications(mut self) -> Self {
        self.add_default_verifications();
        self
    }

    /// Attach a verification in place.
    pub fn add_verification(&mut self, verification: Arc<dyn SensorVerification>) {
        self.verifications.push(verification);
    }

    /// Attach every default verification applicable to the environment, in place.
    pub fn add_default_verifications(&mut self) {
        let defaults = default_verifications(&self.environment);
        self.verifications.extend(defaults);
    }

    /// Toggle per-event logging.
    pub fn log_events(mut self, log: bool) -> Self {
        self.log_events = log;
        self
    }

    /// Environment the leaf runs against.
    pub fn environment(&self) -> &Arc<TestSensorEnvironment> {
        &self.environment
    }

    /// Collection mode.
    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    /// Stats of the last execution.
    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    /// Collect events, then run every verification.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        begin_execution(&mut self.executed)?;
        self.stats
            .add_value(SENSOR_NAME_KEY, self.environment.sensor().name());

        let listener = Arc::new(ValidatingSensorEventListener::new(self.verifications.clone()));
        listener.base().set_log_events(self.log_events);

        if let Err(err) = self.collect(listener, cancel) {
            if !err.is_interrupted() {
                self.stats.add_value(ERROR, err.to_string());
            }
            return Err(err);
        }

        let mut failures = Vec::new();
        for verification in &self.verifications {
            if let Err(err) = verification.verify(&self.environment, &mut self.stats) {
                debug!(verification = verification.name(), error = %err, "verification failed");
                failures.push(err.to_string());
            }
        }
        if failures.is_empty() {
            return Ok(());
        }

        let message = format_assertion_message("VerifySensorOperation", &self.environment, failures.join(", "));
        info!(sensor = self.environment.sensor().name(), failures = failures.len(), "verification failed");
        self.stats.add_value(ERROR, message.clone());
        Err(Error::Verification(message))
    }

    fn collect(&self, listener: Arc<ValidatingSensorEventListener>, cancel: &CancellationToken) -> Result<()> {
        let mut manager = TestSensorManager::new(Arc::clone(&self.environment));
        match self.mode {
            CollectionMode::EventCount(count) => manager.run_sensor(listener, count, cancel),
            CollectionMode::Duration(duration) => manager.run_sensor_for(listener, duration, cancel),
            CollectionMode::DurationThenFlush(duration) => {
                manager.run_sensor_and_flush(listener, duration, cancel)
            }
        }
    }

    /// Configuration of the leaf.
    pub fn plan(&self) -> OperationPlan {
        OperationPlan::Verifiable {
            sensor: self.environment.sensor().name().to_string(),
            sampling_period_us: self.environment.requested_sampling_period_us(),
            max_report_latency_us: self.environment.max_report_latency_us(),
            mode: self.mode,
            verifications: self.verifications.iter().map(|v| v.name().to_string()).collect(),
            log_events: self.log_events,
        }
    }
}

impl Clone for VerifiableSensorOperation {
    fn clone(&self) -> Self {
        Self {
            environment: Arc::clone(&self.environment),
            mode: self.mode,
            verifications: self.verifications.iter().map(|v| v.clone_verification()).collect(),
            log_events: self.log_events,
            stats: SensorStats::new(),
            executed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::simulated::SimulatedSensorManager;
    use crate::stats::{StatValue, FREQUENCY_KEY};
    use crate::types::{Sensor, SensorType};
    use crate::verification::{EventOrderingVerification, FrequencyVerification};

    fn environment(platform: &Arc<SimulatedSensorManager>) -> Arc<TestSensorEnvironment> {
        let sensor = Sensor::new(1, "accel", SensorType::Accelerometer).min_delay_us(2_000);
        TestSensorEnvironment::new(platform.clone(), sensor)
            .config(HarnessConfig::quick())
            .into_shared()
    }

    #[test]
    fn stats_are_empty_until_executed() {
        let platform = SimulatedSensorManager::new();
        let mut op = VerifiableSensorOperation::events(environment(&platform), 10);
        assert!(op.stats().is_empty());

        op.execute(&CancellationToken::new()).unwrap();
        assert_eq!(
            op.stats().value(SENSOR_NAME_KEY),
            Some(&StatValue::Text("accel".to_string()))
        );
    }

    #[test]
    fn default_verifications_pass_on_a_healthy_sensor() {
        let platform = SimulatedSensorManager::new();
        let mut op = VerifiableSensorOperation::events(environment(&platform), 50)
            .with_default_verifications();
        op.execute(&CancellationToken::new()).unwrap();
        assert!(op.stats().contains_key("event_out_of_order_passed"));
        assert!(op.stats().contains_key("magnitude_passed"));
    }

    #[test]
    fn every_failure_is_reported() {
        let platform = SimulatedSensorManager::new();
        platform.set_scripted_timestamps(Some(vec![100, 150, 140, 200]));
        let mut op = VerifiableSensorOperation::duration(environment(&platform), Duration::from_millis(40))
            .with_verification(Arc::new(EventOrderingVerification::new()))
            .with_verification(Arc::new(FrequencyVerification::new(1.0, 2.0)));

        let err = op.execute(&CancellationToken::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("VerifySensorOperation | sensor='accel'"), "{message}");
        assert!(message.contains("Out of order events"), "{message}");
        assert!(message.contains(", Frequency out of range"), "{message}");
        assert!(op.stats().contains_key(FREQUENCY_KEY));
        assert_eq!(op.stats().value(ERROR), Some(&StatValue::Text(message)));
    }

    #[test]
    fn flush_mode_runs_a_flush() {
        let platform = SimulatedSensorManager::new();
        let mut op = VerifiableSensorOperation::flush_after(environment(&platform), Duration::from_millis(10));
        op.execute(&CancellationToken::new()).unwrap();
        assert_eq!(platform.flush_calls(), 1);
    }

    #[test]
    fn lost_flush_completion_times_out() {
        let platform = SimulatedSensorManager::new();
        platform.set_suppress_flush_completion(true);
        let mut op = VerifiableSensorOperation::flush_after(environment(&platform), Duration::from_millis(10));
        let err = op.execute(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(op.stats().contains_key(ERROR));
        assert_eq!(platform.unregister_calls(), 1);
    }

    #[test]
    fn clone_gets_fresh_verifications() {
        let platform = SimulatedSensorManager::new();
        let op = VerifiableSensorOperation::events(environment(&platform), 5).with_default_verifications();
        let copy = op.clone();
        assert_eq!(copy.plan(), op.plan());
        assert!(!Arc::ptr_eq(&copy.verifications[0], &op.verifications[0]));
    }
}
