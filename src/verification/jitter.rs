//! Timestamp jitter must stay below a percentage of the sampling period.

use std::sync::Arc;

use super::{record_passed, Accumulate, EventState, SensorVerification};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::statistics::jitter_95th_percentile_ns;
use crate::stats::{SensorStats, JITTER_95_PERCENTILE_PERCENT_KEY};
use crate::types::TestSensorEvent;

/// Default limit on the 95th percentile jitter, percent of the expected period.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;

/// Fewer events than this always pass; there is not enough data.
const MIN_EVENTS: usize = 3;

/// Checks the 95th percentile of `|delta - mean(delta)|` against the period.
#[derive(Debug)]
pub struct JitterVerification {
    expected_period_ns: i64,
    threshold_percent: f64,
    state: EventState<TimestampState>,
}

#[derive(Debug, Default)]
struct TimestampState {
    timestamps: Vec<i64>,
}

impl Accumulate for TimestampState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.timestamps.push(event.timestamp);
    }
}

impl JitterVerification {
    /// Jitter check against `expected_period_ns`.
    pub fn new(expected_period_ns: i64, threshold_percent: f64) -> Self {
        Self {
            expected_period_ns,
            threshold_percent,
            state: EventState::default(),
        }
    }

    /// Applies to continuous sensors only.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        if !environment.is_continuous() {
            return None;
        }
        let period_ns = i64::from(environment.expected_sampling_period_us()) * 1_000;
        Some(Self::new(period_ns, DEFAULT_THRESHOLD_PERCENT))
    }
}

impl SensorVerification for JitterVerification {
    fn name(&self) -> &'static str {
        "jitter"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let jitter_ns = self.state.with(|s| {
            if s.timestamps.len() < MIN_EVENTS {
                None
            } else {
                jitter_95th_percentile_ns(&s.timestamps)
            }
        });
        let Some(jitter_ns) = jitter_ns else {
            record_passed(stats, self.name(), true);
            return Ok(());
        };

        let percent = if self.expected_period_ns > 0 {
            jitter_ns / self.expected_period_ns as f64 * 100.0
        } else {
            0.0
        };
        let passed = percent <= self.threshold_percent;
        stats.add_value(JITTER_95_PERCENTILE_PERCENT_KEY, percent);
        record_passed(stats, self.name(), passed);

        if passed {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Jitter out of range: jitter_95th_percentile={:.2}%, expected<={:.2}%",
            percent, self.threshold_percent
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.expected_period_ns, self.threshold_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorType;
    use crate::verification::test_support::{environment, events_at};

    const PERIOD_NS: i64 = 10_000_000;

    #[test]
    fn steady_stream_passes() {
        let env = environment(SensorType::Accelerometer, 10_000);
        let verification = JitterVerification::default_for(&env).unwrap();
        let ts: Vec<i64> = (0..100).map(|i| i * PERIOD_NS + (i % 2) * 100_000).collect();
        verification.add_sensor_events(&events_at(&ts));
        assert!(verification.verify(&env, &mut SensorStats::new()).is_ok());
    }

    #[test]
    fn irregular_stream_fails() {
        let env = environment(SensorType::Accelerometer, 10_000);
        let verification = JitterVerification::new(PERIOD_NS, 10.0);
        // deltas alternate 5 ms and 15 ms: every delta is 5 ms (50%) off the mean
        let mut ts = vec![0i64];
        for i in 0..40 {
            let step = if i % 2 == 0 { 5_000_000 } else { 15_000_000 };
            ts.push(ts[ts.len() - 1] + step);
        }
        verification.add_sensor_events(&events_at(&ts));
        let mut stats = SensorStats::new();
        let message = verification.verify(&env, &mut stats).unwrap_err().to_string();
        assert!(message.contains("jitter_95th_percentile=50.00%"), "{message}");
        assert!(stats.contains_key(JITTER_95_PERCENTILE_PERCENT_KEY));
    }

    #[test]
    fn too_few_events_pass() {
        let env = environment(SensorType::Accelerometer, 10_000);
        let verification = JitterVerification::new(PERIOD_NS, 10.0);
        verification.add_sensor_events(&events_at(&[0, 50_000_000]));
        assert!(verification.verify(&env, &mut SensorStats::new()).is_ok());
    }
}
