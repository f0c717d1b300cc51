//! Strict-order driver for one sensor registration.
//!
//! [`SensorManager`] is the platform seam; [`TestSensorManager`] wraps it with
//! the harness rules: at most one registration at a time, warned no-ops on
//! out-of-order calls, and an RAII registration that unregisters exactly once
//! whatever happens while it is held.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::helpers::format_assertion_message;
use crate::listener::{SensorEventListener, TestListener};
use crate::sync::CancellationToken;
use crate::types::Sensor;

/// Platform sensor subsystem.
///
/// Flush completion is reported asynchronously through
/// [`SensorEventListener::on_flush_completed`].
pub trait SensorManager: Send + Sync {
    /// Start delivering events of `sensor` to `listener`. Returns `false` when refused.
    fn register_listener(
        &self,
        listener: Arc<dyn SensorEventListener>,
        sensor: &Sensor,
        sampling_period_us: u32,
        max_report_latency_us: u32,
    ) -> bool;

    /// Stop delivering events of `sensor` to `listener`.
    fn unregister_listener(&self, listener: &Arc<dyn SensorEventListener>, sensor: &Sensor);

    /// Ask the sensor to flush its FIFO to `listener`. Returns `false` when refused.
    fn flush(&self, listener: &Arc<dyn SensorEventListener>) -> bool;
}

/// A listener registered with the platform; dropping it unregisters.
pub struct ActiveRegistration {
    platform: Arc<dyn SensorManager>,
    sensor: Sensor,
    listener: Arc<dyn TestListener>,
    event_listener: Arc<dyn SensorEventListener>,
}

impl ActiveRegistration {
    /// Listener the platform delivers to.
    pub fn listener(&self) -> &Arc<dyn TestListener> {
        &self.listener
    }
}

impl Drop for ActiveRegistration {
    fn drop(&mut self) {
        debug!(sensor = %self.sensor, "unregistering listener");
        self.platform.unregister_listener(&self.event_listener, &self.sensor);
    }
}

impl fmt::Debug for ActiveRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRegistration")
            .field("sensor", &self.sensor.name())
            .finish_non_exhaustive()
    }
}

/// Drives register, wait, flush and unregister for the sensor of one environment.
#[derive(Debug)]
pub struct TestSensorManager {
    environment: Arc<TestSensorEnvironment>,
    registration: Option<ActiveRegistration>,
}

impl TestSensorManager {
    /// Manager for `environment`'s sensor and rates.
    pub fn new(environment: Arc<TestSensorEnvironment>) -> Self {
        Self {
            environment,
            registration: None,
        }
    }

    /// Environment this manager registers with.
    pub fn environment(&self) -> &Arc<TestSensorEnvironment> {
        &self.environment
    }

    /// Whether a listener is currently registered.
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Register `listener` with the platform at the environment's rates.
    ///
    /// A second registration is a warned no-op. The listener is recorded
    /// before the platform is asked, so a refused registration is still
    /// released by [`unregister_listener`](Self::unregister_listener).
    pub fn register_listener(&mut self, listener: Arc<dyn TestListener>) -> Result<()> {
        if self.registration.is_some() {
            warn!(sensor = %self.environment.sensor(), "listener already registered, returning");
            return Ok(());
        }

        listener.set_environment(Arc::clone(&self.environment));
        let event_listener = Arc::clone(&listener).into_event_listener();
        let platform = Arc::clone(self.environment.platform());
        let sensor = self.environment.sensor().clone();
        let registration = self.registration.insert(ActiveRegistration {
            platform: Arc::clone(&platform),
            sensor: sensor.clone(),
            listener,
            event_listener: Arc::clone(&event_listener),
        });
        debug!(sensor = %registration.sensor, "registering listener");

        let accepted = platform.register_listener(
            event_listener,
            &sensor,
            self.environment.requested_sampling_period_us(),
            self.environment.max_report_latency_us(),
        );
        if accepted {
            Ok(())
        } else {
            Err(Error::Registration(format_assertion_message(
                "registerListener",
                &self.environment,
                "",
            )))
        }
    }

    /// Unregister the current listener; a warned no-op when none is registered.
    pub fn unregister_listener(&mut self) {
        if self.registration.take().is_none() {
            warn!(sensor = %self.environment.sensor(), "no listener registered, returning");
        }
    }

    /// Block until the registered listener receives `count` events.
    pub fn wait_for_events(&self, count: usize, cancel: &CancellationToken) -> Result<()> {
        match &self.registration {
            Some(registration) => registration.listener.wait_for_events(count, cancel),
            None => {
                warn!(sensor = %self.environment.sensor(), "no listener registered, returning");
                Ok(())
            }
        }
    }

    /// Let the registered listener collect events for `duration`.
    pub fn wait_for_duration(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        match &self.registration {
            Some(registration) => registration.listener.wait_for_duration(duration, cancel),
            None => {
                warn!(sensor = %self.environment.sensor(), "no listener registered, returning");
                Ok(())
            }
        }
    }

    /// Request a flush without waiting for it. No-op when nothing is registered.
    pub fn start_flush(&self) -> Result<()> {
        let Some(registration) = &self.registration else {
            return Ok(());
        };
        registration.listener.base().arm_flush();
        if registration.platform.flush(&registration.event_listener) {
            Ok(())
        } else {
            Err(Error::Registration(format_assertion_message("Flush", &self.environment, "")))
        }
    }

    /// Block until the requested flush completes. No-op when nothing is registered.
    pub fn wait_for_flush_completed(&self, cancel: &CancellationToken) -> Result<()> {
        match &self.registration {
            Some(registration) => registration.listener.wait_for_flush_complete(cancel),
            None => Ok(()),
        }
    }

    /// [`start_flush`](Self::start_flush) then [`wait_for_flush_completed`](Self::wait_for_flush_completed).
    pub fn flush(&self, cancel: &CancellationToken) -> Result<()> {
        if self.registration.is_none() {
            return Ok(());
        }
        self.start_flush()?;
        self.wait_for_flush_completed(cancel)
    }

    /// Register, collect `count` events, unregister.
    pub fn run_sensor(
        &mut self,
        listener: Arc<dyn TestListener>,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_registered(listener, |manager| manager.wait_for_events(count, cancel))
    }

    /// Register, collect for `duration`, unregister.
    pub fn run_sensor_for(
        &mut self,
        listener: Arc<dyn TestListener>,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_registered(listener, |manager| manager.wait_for_duration(duration, cancel))
    }

    /// Register, collect for `duration`, flush and wait for completion, unregister.
    pub fn run_sensor_and_flush(
        &mut self,
        listener: Arc<dyn TestListener>,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_registered(listener, |manager| {
            cancel.sleep(duration)?;
            manager.flush(cancel)
        })
    }

    fn run_registered(
        &mut self,
        listener: Arc<dyn TestListener>,
        body: impl FnOnce(&Self) -> Result<()>,
    ) -> Result<()> {
        if self.registration.is_some() {
            warn!(sensor = %self.environment.sensor(), "listener already registered, returning");
            return Ok(());
        }
        let outcome = self.register_listener(listener).and_then(|()| body(self));
        self.unregister_listener();
        outcome
    }
}
