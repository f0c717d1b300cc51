//! End-to-end behaviour of operation trees against the simulated platform.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{accelerometer_setup, environment, init_tracing};
use sensor_harness::verification::{EventOrderingVerification, MagnitudeVerification};
use sensor_harness::{
    CancellationToken, Error, OperationReport, ParallelSensorOperation, RepeatingSensorOperation,
    Sensor, SensorOperation, SensorType, SequentialSensorOperation, SimulatedPowerManager,
    SimulatedSensorManager, StatValue, VerifiableSensorOperation, WakeLockOperation, ERROR,
    SENSOR_NAME_KEY,
};

/// Leaf on its own platform whose ordering check fails.
fn out_of_order_leaf() -> VerifiableSensorOperation {
    let platform = SimulatedSensorManager::new();
    platform.set_scripted_timestamps(Some(vec![100, 150, 140, 200]));
    let env = environment(&platform, common::accelerometer());
    VerifiableSensorOperation::duration(env, Duration::from_millis(30))
        .with_verification(Arc::new(EventOrderingVerification::new()))
}

#[test]
fn leaf_stats_appear_only_after_execution() {
    let (_platform, env) = accelerometer_setup();
    let mut op = VerifiableSensorOperation::events(env, 20).with_default_verifications();
    assert!(op.stats().is_empty());

    op.execute(&CancellationToken::new()).unwrap();
    assert_eq!(
        op.stats().value(SENSOR_NAME_KEY),
        Some(&StatValue::Text("accel".to_string()))
    );
    assert_eq!(op.stats().value("event_out_of_order_passed"), Some(&StatValue::Bool(true)));
}

#[test]
fn sequential_stops_after_the_failing_child() {
    let (platform, env) = accelerometer_setup();
    let mut op = SequentialSensorOperation::new()
        .add(VerifiableSensorOperation::duration(Arc::clone(&env), Duration::from_millis(10)))
        .add(out_of_order_leaf())
        .add(VerifiableSensorOperation::duration(env, Duration::from_millis(10)));

    let err = op.execute(&CancellationToken::new()).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Operation 1 failed: \"VerifySensorOperation"), "{message}");
    assert!(message.contains("Out of order events: count=1, positions=[2:(150, 140)]"), "{message}");

    // A ran on the shared platform, B on its own, C never.
    assert_eq!(platform.register_calls(), 1);
    assert!(op.stats().contains_key("sequential_001_event_out_of_order_count"));
    assert!(!op.stats().contains_key("sequential_002_sensor_name"));
}

#[test]
fn parallel_reports_failures_and_timeouts_together() {
    let (platform, env) = accelerometer_setup();
    let mut op = ParallelSensorOperation::with_timeout(Duration::from_millis(400))
        .add(VerifiableSensorOperation::duration(Arc::clone(&env), Duration::from_millis(20)))
        .add(out_of_order_leaf())
        .add(VerifiableSensorOperation::duration(env, Duration::from_secs(30)));

    let started = Instant::now();
    let err = op.execute(&CancellationToken::new()).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));

    let message = err.to_string();
    assert!(message.contains("Out of order events"), "{message}");
    assert!(message.contains("Operation [2] timed out"), "{message}");
    match err {
        Error::Aggregate { failures, timed_out, .. } => {
            assert_eq!(timed_out, vec![2]);
            assert_eq!(failures.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1]);
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }

    // Every child started; the straggler was cancelled and released.
    assert_eq!(platform.register_calls(), 2);
    assert_eq!(platform.unregister_calls(), 2);
    assert_eq!(platform.active_registrations(), 0);
    assert!(op.stats().contains_key(ERROR));
}

#[test]
fn repeating_aborts_at_the_failing_iteration() {
    init_tracing();
    let platform = SimulatedSensorManager::new();
    // Registrations after the second one report a far-off magnitude.
    let registrations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&registrations);
    platform.set_value_generator(Some(Arc::new(move |index| {
        let registration = if index == 0 {
            counter.fetch_add(1, Ordering::SeqCst)
        } else {
            counter.load(Ordering::SeqCst) - 1
        };
        if registration == 2 {
            vec![0.0, 0.0, 50.0]
        } else {
            vec![0.0, 0.0, 9.80665]
        }
    })));
    let env = environment(&platform, common::accelerometer());
    let leaf = VerifiableSensorOperation::events(env, 5)
        .with_verification(Arc::new(MagnitudeVerification::new(9.80665, 1.0)));
    let mut op = RepeatingSensorOperation::new(leaf, 5);

    let err = op.execute(&CancellationToken::new()).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Iteration 2 failed: \""), "{message}");
    assert!(message.contains("Magnitude out of range"), "{message}");

    for index in 0..=2 {
        assert!(op.stats().contains_key(&format!("repeating_{index:03}_sensor_name")));
    }
    assert!(!op.stats().contains_key("repeating_003_sensor_name"));
    assert_eq!(platform.register_calls(), 3);
}

#[test]
fn cloned_trees_keep_their_plan() {
    let (platform, env) = accelerometer_setup();
    let power = SimulatedPowerManager::new();
    let leaf = VerifiableSensorOperation::events(Arc::clone(&env), 10).with_default_verifications();
    let mut op: SensorOperation = SequentialSensorOperation::new()
        .add(WakeLockOperation::new(leaf.clone(), power.clone()))
        .add(
            ParallelSensorOperation::with_timeout(Duration::from_secs(5))
                .add(leaf.clone())
                .add(RepeatingSensorOperation::new(leaf, 2)),
        )
        .into();

    op.execute(&CancellationToken::new()).unwrap();
    assert!(!op.stats().is_empty());
    assert_eq!(power.held_count(), 0);
    assert_eq!(platform.active_registrations(), 0);

    let copy = op.clone().clone();
    assert_eq!(copy.plan(), op.plan());
    assert!(copy.stats().is_empty());

    // The copy runs although the executed tree cannot run again.
    assert!(matches!(op.execute(&CancellationToken::new()), Err(Error::AlreadyExecuted)));
    let mut copy = copy;
    copy.execute(&CancellationToken::new()).unwrap();
}

#[test]
fn cancellation_reaches_nested_leaves() {
    let (platform, env) = accelerometer_setup();
    let mut op: SensorOperation = SequentialSensorOperation::new()
        .add(
            ParallelSensorOperation::new()
                .add(VerifiableSensorOperation::duration(Arc::clone(&env), Duration::from_secs(30)))
                .add(RepeatingSensorOperation::new(
                    VerifiableSensorOperation::duration(env, Duration::from_secs(30)),
                    3,
                )),
        )
        .into();

    let cancel = CancellationToken::new();
    let trigger = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        })
    };
    let err = op.execute(&cancel).unwrap_err();
    trigger.join().unwrap();

    assert!(err.is_interrupted(), "{err:?}");
    assert!(!op.stats().contains_key(ERROR));
    assert_eq!(platform.active_registrations(), 0);
}

#[test]
fn report_captures_plan_outcome_and_stats() {
    let (_platform, env) = accelerometer_setup();
    let mut op: SensorOperation = SequentialSensorOperation::new()
        .add(VerifiableSensorOperation::events(env, 10).with_default_verifications())
        .add(out_of_order_leaf())
        .into();
    let outcome = op.execute(&CancellationToken::new());
    let report = OperationReport::new("accel", &op, &outcome);

    assert!(!report.passed);
    assert_eq!(report.failed_checks(), vec!["sequential_001_event_out_of_order"]);

    let json = sensor_harness::output::to_json(&report).unwrap();
    let parsed = sensor_harness::output::json::from_json(&json).unwrap();
    assert_eq!(parsed.plan, report.plan);
    assert_eq!(parsed.error, report.error);
    assert!(parsed.stats.keys().eq(report.stats.keys()));

    colored::control::set_override(false);
    let text = sensor_harness::output::format_report(&report);
    assert!(text.contains("sequential (2 operations)"));
    assert!(text.contains("sequential_001_event_out_of_order_passed"));
}

#[test]
fn gyroscope_defaults_expect_zero_rotation() {
    init_tracing();
    let platform = SimulatedSensorManager::new();
    let gyro = Sensor::new(4, "gyro", SensorType::Gyroscope).min_delay_us(2_000);
    let env = environment(&platform, gyro);
    let mut op = VerifiableSensorOperation::events(env, 30).with_default_verifications();
    op.execute(&CancellationToken::new()).unwrap();
    assert_eq!(op.stats().value("magnitude_passed"), Some(&StatValue::Bool(true)));
}
