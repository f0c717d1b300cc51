//! Composable test operations.
//!
//! A test plan is a tree of [`SensorOperation`] nodes. Leaves
//! ([`VerifiableSensorOperation`]) drive a sensor and verify what it
//! delivered; composites run their children in sequence, in parallel,
//! repeatedly or under a wake lock, and merge the children's stats under
//! indexed prefixes.
//!
//! ```ignore
//! let env = TestSensorEnvironment::new(platform, accel).into_shared();
//! let mut plan = SensorOperation::from(
//!     SequentialSensorOperation::new()
//!         .add(VerifiableSensorOperation::events(Arc::clone(&env), 100).with_default_verifications())
//!         .add(RepeatingSensorOperation::new(leaf, 3)),
//! );
//! plan.execute(&CancellationToken::new())?;
//! plan.stats().log_stats("accel");
//! ```
//!
//! Every node runs at most once: a second `execute` fails with
//! [`Error::AlreadyExecuted`]. `Clone` copies the configuration of the whole
//! subtree into fresh, unexecuted nodes with empty stats.

mod parallel;
mod repeating;
mod sequential;
mod verifiable;
mod wake_lock;

pub use parallel::ParallelSensorOperation;
pub use repeating::RepeatingSensorOperation;
pub use sequential::SequentialSensorOperation;
pub use verifiable::{CollectionMode, VerifiableSensorOperation};
pub use wake_lock::{PowerManager, WakeLock, WakeLockGuard, WakeLockLevel, WakeLockOperation};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::SensorStats;
use crate::sync::CancellationToken;

/// One node of an operation tree.
#[derive(Debug, Clone)]
pub enum SensorOperation {
    /// Children one after another, stopping at the first failure.
    Sequential(SequentialSensorOperation),
    /// Children concurrently, with an optional deadline.
    Parallel(ParallelSensorOperation),
    /// Fresh clones of one operation, a fixed number of times.
    Repeating(RepeatingSensorOperation),
    /// One operation while a wake lock is held.
    WakeLock(WakeLockOperation),
    /// Sensor collection followed by verifications.
    Verifiable(VerifiableSensorOperation),
}

impl SensorOperation {
    /// Run the node, blocking until it and all its children finish.
    ///
    /// Fails with the node's failure, [`Error::Interrupted`] when `cancel`
    /// fires, or [`Error::AlreadyExecuted`] on a second call.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self {
            SensorOperation::Sequential(op) => op.execute(cancel),
            SensorOperation::Parallel(op) => op.execute(cancel),
            SensorOperation::Repeating(op) => op.execute(cancel),
            SensorOperation::WakeLock(op) => op.execute(cancel),
            SensorOperation::Verifiable(op) => op.execute(cancel),
        }
    }

    /// Stats written by the last execution (empty before).
    pub fn stats(&self) -> &SensorStats {
        match self {
            SensorOperation::Sequential(op) => op.stats(),
            SensorOperation::Parallel(op) => op.stats(),
            SensorOperation::Repeating(op) => op.stats(),
            SensorOperation::WakeLock(op) => op.stats(),
            SensorOperation::Verifiable(op) => op.stats(),
        }
    }

    /// Configuration of the subtree.
    pub fn plan(&self) -> OperationPlan {
        match self {
            SensorOperation::Sequential(op) => op.plan(),
            SensorOperation::Parallel(op) => op.plan(),
            SensorOperation::Repeating(op) => op.plan(),
            SensorOperation::WakeLock(op) => op.plan(),
            SensorOperation::Verifiable(op) => op.plan(),
        }
    }
}

macro_rules! impl_from_operation {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SensorOperation {
                fn from(op: $ty) -> Self {
                    SensorOperation::$variant(op)
                }
            }
        )*
    };
}

impl_from_operation! {
    Sequential => SequentialSensorOperation,
    Parallel => ParallelSensorOperation,
    Repeating => RepeatingSensorOperation,
    WakeLock => WakeLockOperation,
    Verifiable => VerifiableSensorOperation,
}

/// Serializable description of an operation subtree.
///
/// Two trees with equal plans run the same operations with the same
/// parameters; stats and execution state are not part of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPlan {
    /// See [`SequentialSensorOperation`].
    Sequential {
        /// Child plans in execution order.
        children: Vec<OperationPlan>,
    },
    /// See [`ParallelSensorOperation`].
    Parallel {
        /// Aggregate deadline, if any.
        timeout: Option<Duration>,
        /// Child plans by index.
        children: Vec<OperationPlan>,
    },
    /// See [`RepeatingSensorOperation`].
    Repeating {
        /// Number of iterations.
        iterations: usize,
        /// Plan of each iteration.
        operation: Box<OperationPlan>,
    },
    /// See [`WakeLockOperation`].
    WakeLock {
        /// Wake lock level.
        level: WakeLockLevel,
        /// Plan run under the lock.
        operation: Box<OperationPlan>,
    },
    /// See [`VerifiableSensorOperation`].
    Verifiable {
        /// Sensor name.
        sensor: String,
        /// Requested sampling period, microseconds.
        sampling_period_us: u32,
        /// Requested batch latency, microseconds.
        max_report_latency_us: u32,
        /// What is collected.
        mode: CollectionMode,
        /// Names of the attached verifications, in evaluation order.
        verifications: Vec<String>,
        /// Per-event logging.
        log_events: bool,
    },
}

/// Mark a node executed, failing if it already ran.
pub(crate) fn begin_execution(executed: &mut bool) -> Result<()> {
    if std::mem::replace(executed, true) {
        return Err(Error::AlreadyExecuted);
    }
    Ok(())
}

/// Annotate a child failure with its position, e.g. `Operation 1 failed: "..."`.
pub(crate) fn child_failure(label: &str, index: usize, source: Error) -> Error {
    Error::Child {
        message: format!("{label} {index} failed: \"{source}\""),
        source: Box::new(source),
    }
}
