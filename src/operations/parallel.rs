use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{begin_execution, OperationPlan, SensorOperation};
use crate::error::{Error, Result};
use crate::stats::{SensorStats, ERROR};
use crate::sync::{lock, CancellationToken, CountDownLatch};
use crate::thread_pool::build_pool;

/// Stats prefix of the children, e.g. `parallel_001_sensor_name`.
pub const STATS_TAG: &str = "parallel";

/// Shortest wait for stragglers once the deadline has passed.
///
/// A child that completes at the deadline is still collected instead of
/// being reported as timed out.
const MIN_REMAINING_WAIT: Duration = Duration::from_nanos(1);

type Slot = Mutex<Option<Result<()>>>;

/// Runs every child concurrently on its own worker, optionally bounded by a deadline.
///
/// The node waits until all children finish, the deadline passes or it is
/// cancelled. Children still running at the deadline are reported as timed
/// out and cancelled; the node returns only after every worker returned.
/// Failures and timeouts are combined into one [`Error::Aggregate`].
#[derive(Debug, Default)]
pub struct ParallelSensorOperation {
    operations: Vec<SensorOperation>,
    timeout: Option<Duration>,
    stats: SensorStats,
    executed: bool,
}

impl ParallelSensorOperation {
    /// Parallel node with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parallel node that gives up on children after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    /// Append a child.
    pub fn add(mut self, operation: impl Into<SensorOperation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    /// Append a child in place.
    pub fn push(&mut self, operation: impl Into<SensorOperation>) {
        self.operations.push(operation.into());
    }

    /// Children by index.
    pub fn operations(&self) -> &[SensorOperation] {
        &self.operations
    }

    /// Aggregate deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Stats of the last execution.
    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    /// Run all children and wait for them.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        begin_execution(&mut self.executed)?;
        let count = self.operations.len();
        if count == 0 {
            return Ok(());
        }

        let pool = build_pool(count, STATS_TAG)?;
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let latch = CountDownLatch::new(count as u64);
        let workers = cancel.child_token();
        let slots: Vec<Slot> = (0..count).map(|_| Mutex::new(None)).collect();

        let outcome = pool.in_place_scope(|scope| {
            for (index, operation) in self.operations.iter_mut().enumerate() {
                let (latch, workers, slot) = (&latch, &workers, &slots[index]);
                scope.spawn(move |_| {
                    debug!(index, "parallel: starting operation");
                    let result = panic::catch_unwind(AssertUnwindSafe(|| operation.execute(workers)))
                        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))));
                    *lock(slot) = Some(result);
                    latch.count_down();
                });
            }

            let waited = wait_for_children(&latch, deadline, cancel);
            let timed_out: Vec<usize> = match waited {
                Ok(false) => slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| lock(slot).is_none())
                    .map(|(index, _)| index)
                    .collect(),
                _ => Vec::new(),
            };
            if !matches!(waited, Ok(true)) {
                // The scope joins every worker; unfinished ones must be told to stop.
                workers.cancel();
            }
            waited.map(|_| timed_out)
        });

        for (index, operation) in self.operations.iter().enumerate() {
            self.stats
                .add_indexed_sensor_stats(STATS_TAG, index, operation.stats());
        }
        let timed_out = outcome?;

        let failures: Vec<(usize, Error)> = slots
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !timed_out.contains(index))
            .filter_map(|(index, slot)| {
                match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
                    Some(Err(err)) => Some((index, err)),
                    _ => None,
                }
            })
            .collect();

        if failures.is_empty() && timed_out.is_empty() {
            return Ok(());
        }
        if !timed_out.is_empty() {
            warn!(timed_out = ?timed_out, "parallel: operations timed out");
        }

        let message = summary_message(&failures, &timed_out);
        if failures.iter().any(|(_, err)| err.is_assertion()) {
            self.stats.add_value(ERROR, message.clone());
        }
        Err(Error::Aggregate {
            message,
            failures,
            timed_out,
        })
    }

    /// Configuration of the subtree.
    pub fn plan(&self) -> OperationPlan {
        OperationPlan::Parallel {
            timeout: self.timeout,
            children: self.operations.iter().map(SensorOperation::plan).collect(),
        }
    }
}

impl Clone for ParallelSensorOperation {
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
            timeout: self.timeout,
            stats: SensorStats::new(),
            executed: false,
        }
    }
}

/// Wait on the completion latch; past the deadline, wait [`MIN_REMAINING_WAIT`] once more.
fn wait_for_children(
    latch: &CountDownLatch,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<bool> {
    match deadline {
        None => latch.wait_until(None, cancel),
        Some(deadline) => {
            let remaining = deadline
                .saturating_duration_since(Instant::now())
                .max(MIN_REMAINING_WAIT);
            latch.wait_timeout(remaining, cancel)
        }
    }
}

fn summary_message(failures: &[(usize, Error)], timed_out: &[usize]) -> String {
    let mut parts: Vec<String> = failures.iter().map(|(_, err)| err.to_string()).collect();
    if !timed_out.is_empty() {
        let indices: Vec<String> = timed_out.iter().map(ToString::to_string).collect();
        let noun = if timed_out.len() == 1 { "Operation" } else { "Operations" };
        parts.push(format!("{noun} [{}] timed out", indices.join(", ")));
    }
    parts.join(", ")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::TestSensorEnvironment;
    use crate::operations::test_support::{environment, failing, passing};
    use crate::operations::VerifiableSensorOperation;
    use crate::simulated::SimulatedSensorManager;
    use crate::types::TestSensorEvent;
    use crate::verification::SensorVerification;
    use std::sync::Arc;

    #[derive(Debug)]
    struct PanickingVerification;

    impl SensorVerification for PanickingVerification {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn add_sensor_event(&self, _event: &TestSensorEvent) {}
        fn verify(&self, _env: &TestSensorEnvironment, _stats: &mut SensorStats) -> Result<()> {
            panic!("verification exploded");
        }
        fn clone_verification(&self) -> Arc<dyn SensorVerification> {
            Arc::new(PanickingVerification)
        }
    }

    #[test]
    fn all_children_succeed() {
        let platform = SimulatedSensorManager::new();
        let mut op = ParallelSensorOperation::new()
            .add(passing(&platform, 10))
            .add(passing(&platform, 10));
        op.execute(&CancellationToken::new()).unwrap();
        assert!(op.stats().contains_key("parallel_000_sensor_name"));
        assert!(op.stats().contains_key("parallel_001_sensor_name"));
        assert_eq!(platform.register_calls(), 2);
    }

    #[test]
    fn failures_and_timeouts_are_aggregated() {
        let platform = SimulatedSensorManager::new();
        let mut op = ParallelSensorOperation::with_timeout(Duration::from_millis(300))
            .add(passing(&platform, 10))
            .add(failing())
            .add(passing(&platform, 10_000));

        let started = Instant::now();
        let err = op.execute(&CancellationToken::new()).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));

        let Error::Aggregate { message, failures, timed_out } = &err else {
            panic!("expected aggregate failure, got {err:?}");
        };
        assert_eq!(timed_out, &vec![2]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert!(message.contains("Out of order events"), "{message}");
        assert!(message.ends_with("Operation [2] timed out"), "{message}");
        assert!(op.stats().contains_key(ERROR));
        assert_eq!(platform.register_calls(), 2);
        assert_eq!(platform.active_registrations(), 0);
    }

    #[test]
    fn several_timeouts_use_plural() {
        let failures: Vec<(usize, Error)> = Vec::new();
        assert_eq!(summary_message(&failures, &[0, 2]), "Operations [0, 2] timed out");
    }

    #[test]
    fn child_panic_is_reported_as_failure() {
        let platform = SimulatedSensorManager::new();
        let exploding = VerifiableSensorOperation::duration(environment(&platform), Duration::from_millis(5))
            .with_verification(Arc::new(PanickingVerification));
        let mut op = ParallelSensorOperation::new()
            .add(exploding)
            .add(passing(&platform, 5));

        let err = op.execute(&CancellationToken::new()).unwrap_err();
        let Error::Aggregate { failures, .. } = err else {
            panic!("expected aggregate failure");
        };
        assert!(matches!(&failures[0], (0, Error::Panicked(m)) if m.contains("verification exploded")));
    }

    #[test]
    fn interruption_cancels_children() {
        let platform = SimulatedSensorManager::new();
        let mut op = ParallelSensorOperation::new()
            .add(passing(&platform, 10_000))
            .add(passing(&platform, 10_000));
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
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(platform.active_registrations(), 0);
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let platform = SimulatedSensorManager::new();
        let mut op = ParallelSensorOperation::with_timeout(Duration::MAX).add(passing(&platform, 10));
        op.execute(&CancellationToken::new()).unwrap();
        assert!(op.stats().contains_key("parallel_000_sensor_name"));
    }

    #[test]
    fn clone_keeps_timeout() {
        let op = ParallelSensorOperation::with_timeout(Duration::from_secs(3));
        assert_eq!(op.clone().timeout(), Some(Duration::from_secs(3)));
    }
}
