use tracing::debug;

use super::{begin_execution, child_failure, OperationPlan, SensorOperation};
use crate::error::Result;
use crate::stats::{SensorStats, ERROR};
use crate::sync::CancellationToken;

/// Stats prefix of the children, e.g. `sequential_000_sensor_name`.
pub const STATS_TAG: &str = "sequential";

/// Runs children in order and stops at the first failure.
///
/// A failing child is reported as `Operation {i} failed: "{message}"`, the
/// message is also stored under [`ERROR`], and the remaining children never
/// run. The stats of every child that ran are merged, including the failing one.
#[derive(Debug, Default)]
pub struct SequentialSensorOperation {
    operations: Vec<SensorOperation>,
    stats: SensorStats,
    executed: bool,
}

impl SequentialSensorOperation {
    /// Empty sequence.
    pub fn new() -> Self {
        Self::default()
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

    /// Children in execution order.
    pub fn operations(&self) -> &[SensorOperation] {
        &self.operations
    }

    /// Stats of the last execution.
    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    /// Run every child in order.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        begin_execution(&mut self.executed)?;

        for (index, operation) in self.operations.iter_mut().enumerate() {
            debug!(index, "sequential: starting operation");
            let outcome = operation.execute(cancel);
            self.stats
                .add_indexed_sensor_stats(STATS_TAG, index, operation.stats());

            if let Err(err) = outcome {
                if err.is_interrupted() {
                    return Err(err);
                }
                let err = child_failure("Operation", index, err);
                self.stats.add_value(ERROR, err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Configuration of the subtree.
    pub fn plan(&self) -> OperationPlan {
        OperationPlan::Sequential {
            children: self.operations.iter().map(SensorOperation::plan).collect(),
        }
    }
}

impl Clone for SequentialSensorOperation {
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
            stats: SensorStats::new(),
            executed: false,
        }
    }
}
