//! Timestamps must strictly increase.

use std::sync::Arc;

use super::{record_passed, Accumulate, EventState, IndexedEventPair, SensorVerification, MAX_REPORTED_POSITIONS};
use crate::environment::TestSensorEnvironment;
use crate::error::{Error, Result};
use crate::helpers::format_limited;
use crate::stats::{SensorStats, EVENT_OUT_OF_ORDER_COUNT_KEY, EVENT_OUT_OF_ORDER_POSITIONS_KEY};
use crate::types::TestSensorEvent;

/// Flags every event whose timestamp is not greater than the largest
/// timestamp seen before it.
#[derive(Debug, Default)]
pub struct EventOrderingVerification {
    state: EventState<OrderingState>,
}

#[derive(Debug, Default)]
struct OrderingState {
    index: usize,
    max_timestamp: Option<i64>,
    out_of_order: Vec<IndexedEventPair>,
}

impl Accumulate for OrderingState {
    fn accumulate(&mut self, event: &TestSensorEvent) {
        if let Some(max) = self.max_timestamp {
            if event.timestamp <= max {
                self.out_of_order.push(IndexedEventPair {
                    index: self.index,
                    previous_timestamp: max,
                    timestamp: event.timestamp,
                });
            }
        }
        self.max_timestamp = Some(self.max_timestamp.map_or(event.timestamp, |m| m.max(event.timestamp)));
        self.index += 1;
    }
}

impl EventOrderingVerification {
    /// Create an ordering check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordering applies to every sensor.
    pub fn default_for(_environment: &TestSensorEnvironment) -> Option<Self> {
        Some(Self::new())
    }
}

impl SensorVerification for EventOrderingVerification {
    fn name(&self) -> &'static str {
        "event_out_of_order"
    }

    fn add_sensor_event(&self, event: &TestSensorEvent) {
        self.state.add(event);
    }

    fn add_sensor_events(&self, events: &[TestSensorEvent]) {
        self.state.add_all(events);
    }

    fn verify(&self, _environment: &TestSensorEnvironment, stats: &mut SensorStats) -> Result<()> {
        let out_of_order = self.state.with(|s| s.out_of_order.clone());
        let positions: Vec<usize> = out_of_order.iter().map(|p| p.index).collect();

        stats.add_value(EVENT_OUT_OF_ORDER_COUNT_KEY, out_of_order.len());
        stats.add_value(EVENT_OUT_OF_ORDER_POSITIONS_KEY, positions);
        record_passed(stats, self.name(), out_of_order.is_empty());

        if out_of_order.is_empty() {
            return Ok(());
        }
        Err(Error::Verification(format!(
            "Out of order events: count={}, positions=[{}]",
            out_of_order.len(),
            format_limited(&out_of_order, MAX_REPORTED_POSITIONS)
        )))
    }

    fn clone_verification(&self) -> Arc<dyn SensorVerification> {
        Arc::new(Self::new())
    }
}
