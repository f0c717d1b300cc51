use tracing::debug;

use super::{begin_execution, child_failure, OperationPlan, SensorOperation};
use crate::error::Result;
use crate::stats::{SensorStats, ERROR};
use crate::sync::CancellationToken;

/// Stats prefix of the iterations, e.g. `repeating_002_frequency`.
pub const STATS_TAG: &str = "repeating";

/// Runs a fresh clone of one operation `iterations` times.
///
/// The template itself never executes. A failing iteration aborts the loop
/// with `Iteration {i} failed: "{message}"`.
#[derive(Debug)]
pub struct RepeatingSensorOperation {
    operation: Box<SensorOperation>,
    iterations: usize,
    stats: SensorStats,
    executed: bool,
}

impl RepeatingSensorOperation {
    /// Repeat `operation` `iterations` times.
    pub fn new(operation: impl Into<SensorOperation>, iterations: usize) -> Self {
        Self {
            operation: Box::new(operation.into()),
            iterations,
            stats: SensorStats::new(),
            executed: false,
        }
    }

    /// Number of iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Stats of the last execution.
    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    /// Run every iteration.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        begin_execution(&mut self.executed)?;

        for index in 0..self.iterations {
            debug!(index, iterations = self.iterations, "repeating: starting iteration");
            let mut operation = (*self.operation).clone();
            let outcome = operation.execute(cancel);
            self.stats
                .add_indexed_sensor_stats(STATS_TAG, index, operation.stats());

            if let Err(err) = outcome {
                if err.is_interrupted() {
                    return Err(err);
                }
                let err = child_failure("Iteration", index, err);
                self.stats.add_value(ERROR, err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Configuration of the subtree.
    pub fn plan(&self) -> OperationPlan {
        OperationPlan::Repeating {
            iterations: self.iterations,
            operation: Box::new(self.operation.plan()),
        }
    }
}

impl Clone for RepeatingSensorOperation {
    fn clone(&self) -> Self {
        Self::new((*self.operation).clone(), self.iterations)
    }
}
