//! Test environment: the sensor, rates and platform handle an operation runs against.

use std::fmt;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::manager::SensorManager;
use crate::types::{ReportingMode, Sensor};

/// Request the fastest rate the sensor supports.
pub const SENSOR_DELAY_FASTEST: u32 = 0;
/// Rate suitable for games, in microseconds.
pub const SENSOR_DELAY_GAME: u32 = 20_000;
/// Rate suitable for the user interface, in microseconds.
pub const SENSOR_DELAY_UI: u32 = 66_667;
/// Rate suitable for screen orientation changes, in microseconds.
pub const SENSOR_DELAY_NORMAL: u32 = 200_000;

/// Immutable configuration shared by every node of one operation subtree.
///
/// Build it once and share it through an `Arc`:
///
/// ```ignore
/// let env = TestSensorEnvironment::new(platform, sensor)
///     .sampling_period_us(SENSOR_DELAY_GAME)
///     .report_latency_us(0)
///     .into_shared();
/// ```
#[derive(Clone)]
pub struct TestSensorEnvironment {
    platform: Arc<dyn SensorManager>,
    sensor: Sensor,
    requested_sampling_period_us: u32,
    max_report_latency_us: u32,
    config: HarnessConfig,
}

impl TestSensorEnvironment {
    /// Environment requesting the fastest rate with no batching.
    pub fn new(platform: Arc<dyn SensorManager>, sensor: Sensor) -> Self {
        Self {
            platform,
            sensor,
            requested_sampling_period_us: SENSOR_DELAY_FASTEST,
            max_report_latency_us: 0,
            config: HarnessConfig::default(),
        }
    }

    /// Set the requested sampling period in microseconds.
    pub fn sampling_period_us(mut self, us: u32) -> Self {
        self.requested_sampling_period_us = us;
        self
    }

    /// Set the maximum batch report latency in microseconds.
    pub fn report_latency_us(mut self, us: u32) -> Self {
        self.max_report_latency_us = us;
        self
    }

    /// Replace the harness configuration.
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Freeze the environment for sharing across operations.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Platform sensor subsystem.
    pub fn platform(&self) -> &Arc<dyn SensorManager> {
        &self.platform
    }

    /// Sensor under test.
    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    /// Sampling period passed to the platform, in microseconds.
    pub fn requested_sampling_period_us(&self) -> u32 {
        self.requested_sampling_period_us
    }

    /// Batch report latency passed to the platform, in microseconds.
    pub fn max_report_latency_us(&self) -> u32 {
        self.max_report_latency_us
    }

    /// Harness timeouts and logging switches.
    pub fn harness_config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Sampling period the sensor is expected to honour, in microseconds.
    ///
    /// A fastest-rate request maps to the sensor's min delay; other requests
    /// are clamped to `[min_delay, max_delay]`, the upper bound applying only
    /// when the sensor declares one.
    pub fn expected_sampling_period_us(&self) -> u32 {
        let min_delay = self.sensor.min_delay();
        let requested = self.requested_sampling_period_us;
        if requested == SENSOR_DELAY_FASTEST {
            return min_delay;
        }
        let period = requested.max(min_delay);
        match self.sensor.max_delay() {
            0 => period,
            max_delay => period.min(max_delay.max(min_delay)),
        }
    }

    /// Expected event frequency in Hz, `None` when no period applies.
    pub fn expected_frequency_hz(&self) -> Option<f64> {
        match self.expected_sampling_period_us() {
            0 => None,
            period => Some(1_000_000.0 / f64::from(period)),
        }
    }

    /// Whether timing verifications (gap, frequency, jitter) apply.
    pub fn is_continuous(&self) -> bool {
        self.sensor.mode() == ReportingMode::Continuous && self.expected_sampling_period_us() > 0
    }
}

impl fmt::Debug for TestSensorEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSensorEnvironment")
            .field("sensor", &self.sensor.name())
            .field("requested_sampling_period_us", &self.requested_sampling_period_us)
            .field("max_report_latency_us", &self.max_report_latency_us)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
