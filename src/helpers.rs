//! Message formatting and clock helpers shared by listeners, the manager and verifications.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::TestSensorEnvironment;

/// Format a failure message tagged with the environment it happened in.
///
/// ```text
/// WaitForEvents | sensor='accel', samplingPeriod=20000us, maxReportLatency=0us | requested: 50, received: 49
/// ```
pub fn format_assertion_message(
    label: &str,
    environment: &TestSensorEnvironment,
    extras: impl Display,
) -> String {
    let extras = extras.to_string();
    let mut message = format!(
        "{} | sensor='{}', samplingPeriod={}us, maxReportLatency={}us",
        label,
        environment.sensor().name(),
        environment.requested_sampling_period_us(),
        environment.max_report_latency_us(),
    );
    if !extras.is_empty() {
        message.push_str(" | ");
        message.push_str(&extras);
    }
    message
}

/// Join at most `limit` items, noting how many were left out.
pub fn format_limited<T: Display>(items: &[T], limit: usize) -> String {
    let shown: Vec<String> = items.iter().take(limit).map(ToString::to_string).collect();
    let mut joined = shown.join(", ");
    if items.len() > limit {
        joined.push_str(&format!(", ... ({} more)", items.len() - limit));
    }
    joined
}

/// Wall-clock time in nanoseconds since the Unix epoch, used as event receipt time.
pub fn wall_clock_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
