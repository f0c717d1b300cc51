//! No two consecutive events may be further apart than a multiple of the period.

use std::sync::Arc;

use super::{record_passed, Accumulate, EventState, IndexedEventPair, SensorVerification, MAX_REPORTED_POSITIONS};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::helpers::format_limited;
use crate::stats::{SensorStats, EVENT_GAP_COUNT_KEY, EVENT_GAP_POSITIONS_KEY};
use crate::types::TestSensorEvent;

/// Default allowed gap as a multiple of the expected sampling period.
pub const DEFAULT_GAP_THRESHOLD_MULTIPLIER: f64 = 1.8;

/// Flags deltas larger than `threshold_multiplier` times the expected period.
#[derive(Debug)]
pub struct EventGapVerification {
    expected_period_ns: i64,
    threshold_multiplier: f64,
    state: EventState<GapState>,
}

#[derive(Debug, Default)]
struct GapState {
    timestamps: Vec<i64>,
}

impl Accumulate for GapState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        self.timestamps.push(event.timestamp);
    }
}

impl EventGapVerification {
    /// Gap check for a stream sampled every `expected_period_ns`.
    pub fn new(expected_period_ns: i64, threshold_multiplier: f64) -> Self {
        Self {
            expected_period_ns,
            threshold_multiplier,
            state: EventState::default(),
        }
    }

    /// Applies to continuous sensors only.
    pub fn default_for(environment: &TestSensorEnvironment) -> Option<Self> {
        if !environment.is_continuous() {
            return None;
        }
        let period_ns = i64::from(environment.expected_sampling_period_us()) * 1_000;
        Some(Self::new(period_ns, DEFAULT_GAP_THRESHOLD_MULTIPLIER))
    }

    fn threshold_ns(&self) -> f64 {
        self.expected_period_ns as f64 * self.threshold_multiplier
    }
}

impl SensorVerification for EventGapVerification {
    fn name(&self) -> &'static str {
        "event_gap"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let threshold = self.threshold_ns();
        let gaps: Vec<IndexedEventPair> = self.state.with(|s| {
            s.timestamps
                .windows(2)
                .enumerate()
                .filter(|(_, w)| (w[1] - w[0]) as f64 > threshold)
                .map(|(i, w)| IndexedEventPair {
                    index: i + 1,
                    previous_timestamp: w[0],
                    timestamp: w[1],
                })
                .collect()
        });
        let positions: Vec<usize> = gaps.iter().map(|g| g.index).collect();

        stats.add_value(EVENT_GAP_COUNT_KEY, gaps.len());
        stats.add_value(EVENT_GAP_POSITIONS_KEY, positions);
        record_passed(stats, self.name(), gaps.is_empty());

        if gaps.is_empty() {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Event gaps: count={}, threshold={:.0}ns, positions=[{}]",
            gaps.len(),
            threshold,
            format_limited(&gaps, MAX_REPORTED_POSITIONS)
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new(self.expected_period_ns, self.threshold_multiplier))
    }
}
