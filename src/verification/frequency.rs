//! Average event rate must fall inside a band around the requested rate.

use std::sync::Arc;

use super::{record_passed, Accumulate, EventState, SensorVerification};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::statistics::frequency_from_span;
use crate::stats::{SensorStats, FREQUENCY_KEY};
use crate::types::TestSensorEvent;

/// Lowest accepted rate as a fraction of the expected rate.
pub const DEFAULT_LOWER_FACTOR: f64 = 0.9;
/// Highest accepted rate as a multiple of the expected rate.
pub const DEFAULT_UPPER_FACTOR: f64 = 2.2;

/// Checks `lower_hz <= frequency <= upper_hz`.
#[derive(Debug)]
pub struct FrequencyVerification {
    lower_hz: f64,
    upper_hz: f64,
    state: EventState<SpanState>,
}

#[derive(Debug, Default)]
struct SpanState {
    count: usize,
    first: Option<i64>,
    last: i64,
}

impl Accumulate for SpanState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.first.get_or_insert(event.timestamp);
        self.last = event.timestamp;
        self.count += 1;
    }
}

impl FrequencyVerification {
    /// Frequency check with explicit bounds in Hz.
    pub fn new(lower_hz: f64, upper_hz: f64) -> Self {
        Self {
            lower_hz,
            upper_hz,
            state: EventState::default(),
        }
    }

    /// Applies to continuous sensors; bounds derive from the expected rate.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        if !environment.is_continuous() {
            return None;
        }
        let expected = environment.expected_frequency_hz()?;
        Some(Self::new(expected * DEFAULT_LOWER_FACTOR, expected * DEFAULT_UPPER_FACTOR))
    }
}

impl SensorVerification for FrequencyVerification {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let (count, frequency) = self.state.with(|s| {
            let frequency = s.first.and_then(|first| frequency_from_span(s.count, first, s.last));
            (s.count, frequency)
        });

        let Some(frequency) = frequency else {
            record_passed(stats, self.name(), false);
            return Err(Error::Verification(format!(
                "Frequency: insufficient events, count={count}"
            )));
        };

        let passed = frequency >= self.lower_hz && frequency <= self.upper_hz;
        stats.add_value(FREQUENCY_KEY, frequency);
        record_passed(stats, self.name(), passed);

        if passed {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Frequency out of range: frequency={:.2}Hz, expected=[{:.2}, {:.2}]Hz",
            frequency, self.lower_hz, self.upper_hz
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.lower_hz, self.upper_hz))
    }
}
