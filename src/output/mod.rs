//! Reports of executed operation trees.
//!
//! An [`OperationReport`] bundles what ran ([`OperationPlan`]), how it ended
//! and the merged stats. It renders as JSON ([`json`]) or as colored text
//! for a terminal ([`terminal`]).

pub mod json;
pub mod terminal;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::operations::{OperationPlan, SensorOperation};
use crate::stats::SensorStats;

pub use json::{to_json, to_json_pretty};
pub use terminal::format_report;

/// Outcome of one executed operation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Free-form label, usually the test name.
    pub title: String,
    /// Configuration of the tree that ran.
    pub plan: OperationPlan,
    /// Whether `execute` returned `Ok`.
    pub passed: bool,
    /// Failure message, if any.
    pub error: Option<String>,
    /// Stats merged from the whole tree.
    pub stats: SensorStats,
}

impl OperationReport {
    /// Capture `operation` after it ran with `outcome`.
    pub fn new(title: impl Into<String>, operation: &SensorOperation, outcome: &Result<()>) -> Self {
        Self {
            title: title.into(),
            plan: operation.plan(),
            passed: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            stats: operation.stats().clone(),
        }
    }

    /// Names of the verifications that recorded a failure, as `{prefix}{name}`.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.stats
            .iter()
            .filter(|(key, value)| {
                key.ends_with(PASSED_SUFFIX) && matches!(value, crate::stats::StatValue::Bool(false))
            })
            .filter_map(|(key, _)| key.strip_suffix(PASSED_SUFFIX))
            .collect()
    }
}

pub(crate) const PASSED_SUFFIX: &str = "_passed";
