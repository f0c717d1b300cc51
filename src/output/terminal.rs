//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use super::{OperationReport, PASSED_SUFFIX};
use crate::operations::OperationPlan;
use crate::stats::StatValue;

/// Format a report for human-readable terminal output.
///
/// Shows the outcome, the operation tree and every stat, with the
/// `*_passed` flags colored.
pub fn format_report(report: &OperationReport) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str(&format!("sensor-harness: {}\n", report.title));
    output.push_str(&sep);
    output.push('\n');
    output.push('\n');

    if report.passed {
        output.push_str(&format!("  {}\n\n", "\u{2713} Passed".green().bold()));
    } else {
        output.push_str(&format!("  {}\n", "\u{2717} Failed".red().bold()));
        if let Some(error) = &report.error {
            output.push_str(&format!("    {error}\n"));
        }
        output.push('\n');
    }

    output.push_str("  Operations:\n");
    format_plan(&report.plan, 2, &mut output);
    output.push('\n');

    if report.stats.is_empty() {
        output.push_str("  No stats recorded.\n");
    } else {
        output.push_str("  Stats:\n");
        let width = report.stats.keys().map(str::len).max().unwrap_or(0);
        for (key, value) in report.stats.iter() {
            output.push_str(&format!("    {key:<width$}  {}\n", format_value(key, value)));
        }
    }

    output.push('\n');
    output.push_str(&sep);
    output.push('\n');
    output
}

fn format_plan(plan: &OperationPlan, depth: usize, output: &mut String) {
    let indent = "  ".repeat(depth);
    match plan {
        OperationPlan::Sequential { children } => {
            output.push_str(&format!("{indent}sequential ({} operations)\n", children.len()));
            for child in children {
                format_plan(child, depth + 1, output);
            }
        }
        OperationPlan::Parallel { timeout, children } => {
            let timeout = match timeout {
                Some(timeout) => format!(", timeout {} ms", timeout.as_millis()),
                None => String::new(),
            };
            output.push_str(&format!(
                "{indent}parallel ({} operations{timeout})\n",
                children.len()
            ));
            for child in children {
                format_plan(child, depth + 1, output);
            }
        }
        OperationPlan::Repeating { iterations, operation } => {
            output.push_str(&format!("{indent}repeating x{iterations}\n"));
            format_plan(operation, depth + 1, output);
        }
        OperationPlan::WakeLock { level, operation } => {
            output.push_str(&format!("{indent}wake lock ({level:?})\n"));
            format_plan(operation, depth + 1, output);
        }
        OperationPlan::Verifiable {
            sensor,
            sampling_period_us,
            mode,
            verifications,
            ..
        } => {
            output.push_str(&format!(
                "{indent}verify '{sensor}' @ {sampling_period_us}us, {mode:?}, checks: [{}]\n",
                verifications.join(", ")
            ));
        }
    }
}

/// Color `*_passed` flags and the error entries; leave the rest plain.
fn format_value(key: &str, value: &StatValue) -> String {
    match value {
        StatValue::Bool(true) if key.ends_with(PASSED_SUFFIX) => "passed".green().to_string(),
        StatValue::Bool(false) if key.ends_with(PASSED_SUFFIX) => "FAILED".red().bold().to_string(),
        StatValue::Text(text) if key.ends_with(crate::stats::ERROR) => text.red().to_string(),
        other => other.to_string(),
    }
}
