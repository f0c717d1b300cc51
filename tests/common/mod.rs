//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use sensor_harness::{
    HarnessConfig, Sensor, SensorType, SimulatedSensorManager, TestSensorEnvironment,
};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Accelerometer reporting every millisecond.
pub fn accelerometer() -> Sensor {
    Sensor::new(1, "accel", SensorType::Accelerometer).min_delay_us(1_000)
}

/// Environment over `platform` with short timeouts.
pub fn environment(platform: &Arc<SimulatedSensorManager>, sensor: Sensor) -> Arc<TestSensorEnvironment> {
    TestSensorEnvironment::new(platform.clone(), sensor)
        .config(HarnessConfig::quick())
        .into_shared()
}

/// Fresh platform plus an accelerometer environment on it.
pub fn accelerometer_setup() -> (Arc<SimulatedSensorManager>, Arc<TestSensorEnvironment>) {
    init_tracing();
    let platform = SimulatedSensorManager::new();
    let env = environment(&platform, accelerometer());
    (platform, env)
}
