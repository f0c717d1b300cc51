//! Configuration for sensor waits and logging.

use std::env;
use std::time::Duration;

/// Timeouts and logging switches shared by every node of a test plan.
///
/// The values feed the bounded waits of the event listeners:
/// `wait_for_events(n)` blocks for at most
/// `timeout_multiplier * n * expected_period + max_report_latency + event_grace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Fixed grace window added to every wait-for-events timeout (default: 5 s).
    pub event_grace: Duration,

    /// Timeout for a flush-complete callback (default: 5 s).
    pub flush_timeout: Duration,

    /// Multiplier applied to `count * expected_period` (default: 2).
    pub timeout_multiplier: u32,

    /// Log every received event at `trace` level (default: false).
    pub log_events: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            event_grace: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(5),
            timeout_multiplier: 2,
            log_events: false,
        }
    }
}

impl HarnessConfig {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts for fast-feedback test suites and simulated sensors.
    ///
    /// Settings:
    /// - 200 ms event grace (vs 5 s default)
    /// - 1 s flush timeout (vs 5 s default)
    pub fn quick() -> Self {
        Self {
            event_grace: Duration::from_millis(200),
            flush_timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Override the event grace window.
    pub fn event_grace(mut self, grace: Duration) -> Self {
        self.event_grace = grace;
        self
    }

    /// Override the flush timeout.
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Override the period multiplier.
    pub fn timeout_multiplier(mut self, multiplier: u32) -> Self {
        self.timeout_multiplier = multiplier;
        self
    }

    /// Enable or disable per-event logging.
    pub fn log_events(mut self, yes: bool) -> Self {
        self.log_events = yes;
        self
    }

    /// Merge configuration from environment variables.
    ///
    /// Recognised variables: `SENSOR_HARNESS_EVENT_GRACE_MS`,
    /// `SENSOR_HARNESS_FLUSH_TIMEOUT_MS`, `SENSOR_HARNESS_TIMEOUT_MULTIPLIER`
    /// and `SENSOR_HARNESS_LOG_EVENTS` (`1` or `true`). Unparseable values
    /// are ignored.
    pub fn from_env(mut self) -> Self {
        if let Some(ms) = parse_u64_env("SENSOR_HARNESS_EVENT_GRACE_MS") {
            self = self.event_grace(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_u64_env("SENSOR_HARNESS_FLUSH_TIMEOUT_MS") {
            self = self.flush_timeout(Duration::from_millis(ms));
        }
        if let Some(multiplier) = parse_u32_env("SENSOR_HARNESS_TIMEOUT_MULTIPLIER") {
            self = self.timeout_multiplier(multiplier);
        }
        if let Ok(val) = env::var("SENSOR_HARNESS_LOG_EVENTS") {
            self = self.log_events(val == "1" || val.eq_ignore_ascii_case("true"));
        }
        self
    }
}

fn parse_u64_env(key: &str) -> Option<u64> {
    env::var(key).ok()?.parse().ok()
}

fn parse_u32_env(key: &str) -> Option<u32> {
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_timeouts() {
        let config = HarnessConfig::default();
        assert_eq!(config.event_grace, Duration::from_secs(5));
        assert_eq!(config.flush_timeout, Duration::from_secs(5));
        assert_eq!(config.timeout_multiplier, 2);
        assert!(!config.log_events);
    }

    #[test]
    fn setters_chain() {
        let config = HarnessConfig::quick()
            .timeout_multiplier(3)
            .log_events(true);
        assert_eq!(config.event_grace, Duration::from_millis(200));
        assert_eq!(config.timeout_multiplier, 3);
        assert!(config.log_events);
    }

    #[test]
    fn env_overrides_are_applied() {
        env::set_var("SENSOR_HARNESS_FLUSH_TIMEOUT_MS", "750");
        env::set_var("SENSOR_HARNESS_TIMEOUT_MULTIPLIER", "not-a-number");
        let config = HarnessConfig::default().from_env();
        env::remove_var("SENSOR_HARNESS_FLUSH_TIMEOUT_MS");
        env::remove_var("SENSOR_HARNESS_TIMEOUT_MULTIPLIER");

        assert_eq!(config.flush_timeout, Duration::from_millis(750));
        assert_eq!(config.timeout_multiplier, 2);
    }
}
