//! Listener feeding every event to a set of verifications.

use std::fmt;
use std::sync::Arc;

use super::{SensorEventListener, TestListener, TestSensorEventListener};
use crate::types::{Sensor, TestSensorEvent};
use crate::verification::SensorVerification;

/// Forwards each event to its verifications, synchronously on the callback
/// thread, before the base bookkeeping counts it.
pub struct ValidatingSensorEventListener {
    base: TestSensorEventListener,
    verifications: Vec<Arc<dyn SensorVerification>>,
}

impl ValidatingSensorEventListener {
    /// Validator with no delegate.
    pub fn new(verifications: Vec<Arc<dyn SensorVerification>>) -> Self {
        Self {
            base: TestSensorEventListener::new(),
            verifications,
        }
    }

    /// Validator forwarding callbacks to `delegate`.
    pub fn with_delegate(
        delegate: Arc<dyn SensorEventListener>,
        verifications: Vec<Arc<dyn SensorVerification>>,
    ) -> Self {
        Self {
            base: TestSensorEventListener::with_delegate(delegate),
            verifications,
        }
    }

    /// Verifications receiving events.
    pub fn verifications(&self) -> &[Arc<dyn SensorVerification>] {
        &self.verifications
    }
}

impl SensorEventListener for ValidatingSensorEventListener {
    fn on_sensor_changed(&self, event: &TestSensorEvent) {
        for verification in &self.verifications {
            verification.add_sensor_event(event);
        }
        self.base.on_sensor_changed(event);
    }

    fn on_accuracy_changed(&self, sensor: &Sensor, accuracy: i32) {
        self.base.on_accuracy_changed(sensor, accuracy);
    }

    fn on_flush_completed(&self, sensor: &Sensor) {
        self.base.on_flush_completed(sensor);
    }
}

impl TestListener for ValidatingSensorEventListener {
    fn base(&self) -> &TestSensorEventListener {
        &self.base
    }

    fn into_event_listener(self: Arc<Self>) -> Arc<dyn SensorEventListener> {
        self
    }
}

impl fmt::Debug for ValidatingSensorEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.verifications.iter().map(|v| v.name()).collect();
        f.debug_struct("ValidatingSensorEventListener")
            .field("base", &self.base)
            .field("verifications", &names)
            .finish()
    }
}
