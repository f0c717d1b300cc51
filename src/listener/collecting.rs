//! Listener that keeps every event it receives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{SensorEventListener, TestListener, TestSensorEventListener};
use crate::error::Result;
use crate::sync::{lock, CancellationToken};
use crate::types::{Sensor, TestSensorEvent};

/// Buffers events in arrival order. The buffer is cleared at the start of
/// every wait, so it holds exactly the events of the last collection.
#[derive(Debug, Default)]
pub struct CollectingSensorEventListener {
    base: TestSensorEventListener,
    events: Mutex<Vec<TestSensorEvent>>,
}

impl CollectingSensorEventListener {
    /// Collector with no delegate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector forwarding callbacks to `delegate`.
    pub fn with_delegate(delegate: Arc<dyn SensorEventListener>) -> Self {
        Self {
            base: TestSensorEventListener::with_delegate(delegate),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the events collected so far.
    pub fn events(&self) -> Vec<TestSensorEvent> {
        lock(&self.events).clone()
    }

    /// Drop every collected event.
    pub fn clear_events(&self) {
        lock(&self.events).clear();
    }
}

impl SensorEventListener for CollectingSensorEventListener {
    fn on_sensor_changed(&self, event: &TestSensorEvent) {
        self.base.on_sensor_changed(event);
        lock(&self.events).push(event.clone());
    }

    fn on_accuracy_changed(&self, sensor: &Sensor, accuracy: i32) {
        self.base.on_accuracy_changed(sensor, accuracy);
    }

    fn on_flush_completed(&self, sensor: &Sensor) {
        self.base.on_flush_completed(sensor);
    }
}

impl TestListener for CollectingSensorEventListener {
    fn base(&self) -> &TestSensorEventListener {
        &self.base
    }

    fn wait_for_events(&self, count: usize, cancel: &CancellationToken) -> Result<()> {
        self.clear_events();
        self.base.wait_for_events(count, cancel)
    }

    fn wait_for_duration(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        self.clear_events();
        self.base.wait_for_duration(duration, cancel)
    }

    fn into_event_listener(self: Arc<Self>) -> Arc<dyn SensorEventListener> {
        self
    }
}
