//! Core listener owning the event and flush latches.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use super::{SensorEventListener, TestListener};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::helpers::{format_assertion_message, wall_clock_ns};
use crate::sync::{lock, CancellationToken, CountDownLatch};
use crate::types::{Sensor, TestSensorEvent};

/// How long `wait_for_events(count)` may block in `environment`.
///
/// `multiplier * count * expected_period + max_report_latency + grace`
pub fn event_timeout(environment: &TestSensorEnvironment, count: usize) -> Duration {
    let config = environment.harness_config();
    let period_us = u64::from(environment.expected_sampling_period_us());
    let scaled_us = u64::from(config.timeout_multiplier)
        .saturating_mul(count as u64)
        .saturating_mul(period_us);
    let latency_us = u64::from(environment.max_report_latency_us());
    Duration::from_micros(scaled_us.saturating_add(latency_us)).saturating_add(config.event_grace)
}

/// Counts events and flush completions, forwarding callbacks to an optional delegate.
pub struct TestSensorEventListener {
    delegate: Option<Arc<dyn SensorEventListener>>,
    environment: Mutex<Option<Arc<TestSensorEnvironment>>>,
    event_latch: Mutex<Option<Arc<CountDownLatch>>>,
    flush_latch: Mutex<Arc<CountDownLatch>>,
    armed_flush: Mutex<Option<Arc<CountDownLatch>>>,
    log_events: AtomicBool,
}

impl Default for TestSensorEventListener {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSensorEventListener {
    /// Listener with no delegate.
    pub fn new() -> Self {
        Self {
            delegate: None,
            environment: Mutex::new(None),
            event_latch: Mutex::new(None),
            flush_latch: Mutex::new(Arc::new(CountDownLatch::new(1))),
            armed_flush: Mutex::new(None),
            log_events: AtomicBool::new(false),
        }
    }

    /// Listener forwarding every callback to `delegate`.
    pub fn with_delegate(delegate: Arc<dyn SensorEventListener>) -> Self {
        Self {
            delegate: Some(delegate),
            ..Self::new()
        }
    }

    /// Attach the environment used for timeouts and failure messages.
    pub fn set_environment(&self, environment: Arc<TestSensorEnvironment>) {
        *lock(&self.environment) = Some(environment);
    }

    /// Environment attached at registration, if any.
    pub fn environment(&self) -> Option<Arc<TestSensorEnvironment>> {
        lock(&self.environment).clone()
    }

    /// Toggle per-event logging.
    pub fn set_log_events(&self, log: bool) {
        self.log_events.store(log, Ordering::Relaxed);
    }

    /// Events still awaited by a running `wait_for_events`, `None` when idle.
    pub fn events_outstanding(&self) -> Option<u64> {
        lock(&self.event_latch).as_ref().map(|latch| latch.count())
    }

    /// Block until `count` events arrive after the call.
    ///
    /// Fails with [`Error::Timeout`] after [`event_timeout`]; the message
    /// carries the requested and received counts and the time waited.
    pub fn wait_for_events(&self, count: usize, cancel: &CancellationToken) -> Result<()> {
        let environment = self.require_environment()?;
        let timeout = event_timeout(&environment, count);
        let latch = Arc::new(CountDownLatch::new(count as u64));
        *lock(&self.event_latch) = Some(Arc::clone(&latch));

        let started = Instant::now();
        let outcome = latch.wait_timeout(timeout, cancel);
        *lock(&self.event_latch) = None;

        if outcome? {
            return Ok(());
        }
        let received = (count as u64).saturating_sub(latch.count());
        Err(Error::Timeout(format_assertion_message(
            "WaitForEvents",
            &environment,
            format!(
                "requested: {}, received: {}, elapsed: {} ms",
                count,
                received,
                started.elapsed().as_millis()
            ),
        )))
    }

    /// Let events accumulate for `duration`.
    pub fn wait_for_duration(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        cancel.sleep(duration)
    }

    /// Capture the flush latch a subsequent [`wait_for_flush_complete`](Self::wait_for_flush_complete)
    /// waits on, so a completion delivered before the wait is not lost.
    pub fn arm_flush(&self) {
        let latch = Arc::clone(&lock(&self.flush_latch));
        *lock(&self.armed_flush) = Some(latch);
    }

    /// Block until a flush completes, at most the configured flush timeout.
    pub fn wait_for_flush_complete(&self, cancel: &CancellationToken) -> Result<()> {
        let environment = self.require_environment()?;
        let latch = match lock(&self.armed_flush).take() {
            Some(latch) => latch,
            None => Arc::clone(&lock(&self.flush_latch)),
        };
        if latch.wait_timeout(environment.harness_config().flush_timeout, cancel)? {
            return Ok(());
        }
        Err(Error::Timeout(format_assertion_message("WaitForFlush", &environment, "")))
    }

    fn require_environment(&self) -> Result<Arc<TestSensorEnvironment>> {
        self.environment()
            .ok_or_else(|| Error::Config("listener has no environment; register it first".to_string()))
    }

    fn log_event(&self, event: &TestSensorEvent) {
        let enabled = self.log_events.load(Ordering::Relaxed)
            || lock(&self.environment)
                .as_ref()
                .is_some_and(|env| env.harness_config().log_events);
        if !enabled {
            return;
        }
        let received = if event.received_timestamp != 0 {
            event.received_timestamp
        } else {
            wall_clock_ns()
        };
        trace!(
            sensor_handle = event.sensor_handle,
            sensor_timestamp_ns = event.timestamp,
            received_timestamp_ns = received,
            values = ?event.values,
            "sensor event"
        );
    }
}

impl SensorEventListener for TestSensorEventListener {
    fn on_sensor_changed(&self, event: &TestSensorEvent) {
        if let Some(delegate) = &self.delegate {
            delegate.on_sensor_changed(event);
        }
        self.log_event(event);
        if let Some(latch) = lock(&self.event_latch).as_ref() {
            latch.count_down();
        }
    }

    fn on_accuracy_changed(&self, sensor: &Sensor, accuracy: i32) {
        if let Some(delegate) = &self.delegate {
            delegate.on_accuracy_changed(sensor, accuracy);
        }
    }

    fn on_flush_completed(&self, sensor: &Sensor) {
        let completed = std::mem::replace(&mut *lock(&self.flush_latch), Arc::new(CountDownLatch::new(1)));
        completed.count_down();
        if let Some(delegate) = &self.delegate {
            delegate.on_flush_completed(sensor);
        }
    }
}

impl TestListener for TestSensorEventListener {
    fn base(&self) -> &TestSensorEventListener {
        self
    }

    fn into_event_listener(self: Arc<Self>) -> Arc<dyn SensorEventListener> {
        self
    }
}

impl fmt::Debug for TestSensorEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSensorEventListener")
            .field("has_delegate", &self.delegate.is_some())
            .field("events_outstanding", &self.events_outstanding())
            .field("log_events", &self.log_events.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
