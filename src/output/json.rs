//! JSON serialization for operation reports.

use super::OperationReport;
use crate::error::Result;

/// Serialize a report to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for reports).
pub fn to_json(report: &OperationReport) -> Result<String> {
    Ok(serde_json::to_string(report)?)
}

/// Serialize a report to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for reports).
pub fn to_json_pretty(report: &OperationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Parse a report written by [`to_json`] or [`to_json_pretty`].
pub fn from_json(json: &str) -> Result<OperationReport> {
    Ok(serde_json::from_str(json)?)
}
