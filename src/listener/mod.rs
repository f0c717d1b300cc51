//! Sensor event listeners with bounded, cancellable waits.
//!
//! The platform delivers callbacks through [`SensorEventListener`]. The
//! harness drives a richer family through [`TestListener`]: every member
//! wraps a [`TestSensorEventListener`] that owns the event and flush latches,
//! and adds its own per-event bookkeeping on top.

mod collecting;
mod test_listener;
mod validating;

pub use collecting::CollectingSensorEventListener;
pub use test_listener::{event_timeout, TestSensorEventListener};
pub use validating::ValidatingSensorEventListener;

use std::sync::Arc;
use std::time::Duration;

use crate::environment::TestSensorEnvironment;
use crate::error::Result;
use crate::sync::CancellationToken;
use crate::types::{Sensor, TestSensorEvent};

/// Platform callback interface.
///
/// Callbacks may arrive on any thread, concurrently with the harness waits.
pub trait SensorEventListener: Send + Sync {
    /// A new event was delivered.
    fn on_sensor_changed(&self, event: &TestSensorEvent);

    /// The sensor's accuracy changed.
    fn on_accuracy_changed(&self, _sensor: &Sensor, _accuracy: i32) {}

    /// A flush requested through the platform completed.
    fn on_flush_completed(&self, _sensor: &Sensor) {}
}

/// Listener the [`TestSensorManager`](crate::manager::TestSensorManager) registers and waits on.
pub trait TestListener: SensorEventListener {
    /// The latch-owning core listener.
    fn base(&self) -> &TestSensorEventListener;

    /// Attach the environment used for timeouts and failure messages.
    fn set_environment(&self, environment: Arc<TestSensorEnvironment>) {
        self.base().set_environment(environment);
    }

    /// Block until `count` events arrive; see [`TestSensorEventListener::wait_for_events`].
    fn wait_for_events(&self, count: usize, cancel: &CancellationToken) -> Result<()> {
        self.base().wait_for_events(count, cancel)
    }

    /// Let events accumulate for `duration`.
    fn wait_for_duration(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        self.base().wait_for_duration(duration, cancel)
    }

    /// Block until the pending flush completes.
    fn wait_for_flush_complete(&self, cancel: &CancellationToken) -> Result<()> {
        self.base().wait_for_flush_complete(cancel)
    }

    /// The same listener, as handed to the platform.
    fn into_event_listener(self: Arc<Self>) -> Arc<dyn SensorEventListener>;
}
