//! Property tests over verifications, statistics and stats merging.

use proptest::prelude::*;
use sensor_harness::statistics::{mean, quantile_of, standard_deviation};
use sensor_harness::verification::EventOrderingVerification;
use sensor_harness::{
    Sensor, SensorStats, SensorType, SensorVerification, SimulatedSensorManager, StatValue,
    TestSensorEnvironment, TestSensorEvent, EVENT_OUT_OF_ORDER_COUNT_KEY,
};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn environment() -> TestSensorEnvironment {
    let sensor = Sensor::new(1, "accel", SensorType::Accelerometer).min_delay_us(1_000);
    TestSensorEnvironment::new(SimulatedSensorManager::new(), sensor)
}

fn events(timestamps: &[i64]) -> Vec<TestSensorEvent> {
    timestamps
        .iter()
        .map(|&ts| TestSensorEvent::new(1, ts, vec![0.0, 0.0, 9.8], 3))
        .collect()
}

/// Events not exceeding the largest earlier timestamp.
fn naive_out_of_order(timestamps: &[i64]) -> usize {
    let mut max = i64::MIN;
    let mut count = 0;
    for (i, &ts) in timestamps.iter().enumerate() {
        if i > 0 && ts <= max {
            count += 1;
        }
        max = max.max(ts);
    }
    count
}

fn arb_stats() -> impl Strategy<Value = SensorStats> {
    prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 0..12).prop_map(|entries| {
        let mut stats = SensorStats::new();
        for (key, value) in entries {
            stats.add_value(key, value);
        }
        stats
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn ordering_matches_a_naive_scan(timestamps in prop::collection::vec(0i64..1_000, 0..64)) {
        let verification = EventOrderingVerification::new();
        verification.add_sensor_events(&events(&timestamps));
        let mut stats = SensorStats::new();
        let result = verification.verify(&environment(), &mut stats);

        let expected = naive_out_of_order(&timestamps);
        prop_assert_eq!(result.is_ok(), expected == 0);
        prop_assert_eq!(
            stats.value(EVENT_OUT_OF_ORDER_COUNT_KEY),
            Some(&StatValue::Int(expected as i64))
        );
    }

    #[test]
    fn strictly_increasing_streams_are_ordered(start in 0i64..1_000_000, steps in prop::collection::vec(1i64..10_000, 0..64)) {
        let mut timestamps = vec![start];
        for step in steps {
            let next = timestamps[timestamps.len() - 1] + step;
            timestamps.push(next);
        }
        let verification = EventOrderingVerification::new();
        verification.add_sensor_events(&events(&timestamps));
        let mut stats = SensorStats::new();
        prop_assert!(verification.verify(&environment(), &mut stats).is_ok());
    }

    #[test]
    fn merged_keys_carry_the_indexed_prefix(child in arb_stats(), index in 0usize..1_000) {
        let mut parent = SensorStats::new();
        parent.add_indexed_sensor_stats("sequential", index, &child);

        let prefix = format!("sequential_{index:03}_");
        prop_assert_eq!(parent.len(), child.len());
        for (key, value) in child.iter() {
            prop_assert_eq!(parent.value(&format!("{prefix}{key}")), Some(value));
        }
    }

    #[test]
    fn quantiles_stay_within_the_data(data in prop::collection::vec(-1e6f64..1e6, 1..200), p in 0.0f64..=1.0) {
        let q = quantile_of(&data, p).unwrap();
        let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let slack = 1e-9 * (max - min).abs().max(1.0);
        prop_assert!(q >= min - slack && q <= max + slack);
    }

    #[test]
    fn standard_deviation_is_non_negative(data in prop::collection::vec(-1e3f64..1e3, 2..100)) {
        let sd = standard_deviation(&data).unwrap();
        let m = mean(&data).unwrap();
        prop_assert!(sd >= 0.0);
        prop_assert!(m.is_finite());
    }
}
