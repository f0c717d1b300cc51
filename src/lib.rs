//! # sensor-harness
//!
//! Drive sensors through composable test plans and verify the statistical
//! properties of the events they deliver.
//!
//! A plan is a tree of operations:
//! - [`VerifiableSensorOperation`] registers a listener, collects events
//!   (a count, a duration, or a duration followed by a flush) and runs
//!   [`SensorVerification`]s over them
//! - [`SequentialSensorOperation`], [`ParallelSensorOperation`],
//!   [`RepeatingSensorOperation`] and [`WakeLockOperation`] compose other
//!   operations
//!
//! Every node records its results into [`SensorStats`]; composites merge their
//! children's stats under indexed prefixes such as `sequential_001_frequency`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sensor_harness::{
//!     CancellationToken, RepeatingSensorOperation, Sensor, SensorType, SimulatedSensorManager,
//!     TestSensorEnvironment, VerifiableSensorOperation, SENSOR_DELAY_GAME,
//! };
//!
//! let platform = SimulatedSensorManager::new();
//! let accel = Sensor::new(1, "accel", SensorType::Accelerometer).min_delay_us(5_000);
//! let env = TestSensorEnvironment::new(platform, accel)
//!     .sampling_period_us(SENSOR_DELAY_GAME)
//!     .into_shared();
//!
//! let leaf = VerifiableSensorOperation::events(env, 200).with_default_verifications();
//! let mut plan = RepeatingSensorOperation::new(leaf, 3);
//! plan.execute(&CancellationToken::new())?;
//! plan.stats().log_stats("accel");
//! ```
//!
//! Real devices plug in by implementing [`SensorManager`] (and
//! [`PowerManager`] for wake locks). The [`simulated`] module provides an
//! in-process platform for tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod environment;
mod error;
mod stats;
mod sync;
mod types;

// Functional modules
pub mod helpers;
pub mod listener;
pub mod manager;
pub mod operations;
pub mod output;
pub mod simulated;
pub mod statistics;
pub mod thread_pool;
pub mod verification;

// Re-exports for public API
pub use config::HarnessConfig;
pub use environment::{
    TestSensorEnvironment, SENSOR_DELAY_FASTEST, SENSOR_DELAY_GAME, SENSOR_DELAY_NORMAL,
    SENSOR_DELAY_UI,
};
pub use error::{Error, Result};
pub use listener::{
    CollectingSensorEventListener, SensorEventListener, TestListener, TestSensorEventListener,
    ValidatingSensorEventListener,
};
pub use manager::{ActiveRegistration, SensorManager, TestSensorManager};
pub use operations::{
    CollectionMode, OperationPlan, ParallelSensorOperation, PowerManager,
    RepeatingSensorOperation, SensorOperation, SequentialSensorOperation,
    VerifiableSensorOperation, WakeLock, WakeLockGuard, WakeLockLevel, WakeLockOperation,
};
pub use output::OperationReport;
pub use simulated::{SimulatedPowerManager, SimulatedSensorManager};
pub use stats::*;
pub use sync::{CancellationToken, CountDownLatch};
pub use types::{ReportingMode, Sensor, SensorType, TestSensorEvent};
pub use verification::{default_verifications, SensorVerification};
