//! Hierarchical key/value results produced by sensor operations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Key holding the failure message of an operation.
pub const ERROR: &str = "error";
/// Key holding the name of the sensor a leaf operation ran against.
pub const SENSOR_NAME_KEY: &str = "sensor_name";

/// Number of out-of-order events.
pub const EVENT_OUT_OF_ORDER_COUNT_KEY: &str = "event_out_of_order_count";
/// Indices of out-of-order events.
pub const EVENT_OUT_OF_ORDER_POSITIONS_KEY: &str = "event_out_of_order_positions";
/// Number of gaps longer than the allowed threshold.
pub const EVENT_GAP_COUNT_KEY: &str = "event_gap_count";
/// Indices of events that closed a gap.
pub const EVENT_GAP_POSITIONS_KEY: &str = "event_gap_positions";
/// Measured frequency in Hz.
pub const FREQUENCY_KEY: &str = "frequency";
/// 95th percentile jitter as a percentage of the expected period.
pub const JITTER_95_PERCENTILE_PERCENT_KEY: &str = "jitter_95_percentile_percent";
/// Mean magnitude of the event values.
pub const MAGNITUDE_KEY: &str = "magnitude";
/// Per-axis means.
pub const MEAN_KEY: &str = "mean";
/// Per-axis standard deviations.
pub const STANDARD_DEVIATION_KEY: &str = "standard_deviation";

/// A single stats value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// List of integers.
    Ints(Vec<i64>),
    /// List of floats.
    Floats(Vec<f64>),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Bool(v) => write!(f, "{v}"),
            StatValue::Int(v) => write!(f, "{v}"),
            StatValue::Float(v) => write!(f, "{v:.4}"),
            StatValue::Text(v) => f.write_str(v),
            StatValue::Ints(v) => write!(f, "{v:?}"),
            StatValue::Floats(v) => {
                let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for StatValue {
    fn from(v: bool) -> Self {
        StatValue::Bool(v)
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Int(v)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl From<Vec<i64>> for StatValue {
    fn from(v: Vec<i64>) -> Self {
        StatValue::Ints(v)
    }
}

impl From<Vec<usize>> for StatValue {
    fn from(v: Vec<usize>) -> Self {
        StatValue::Ints(v.into_iter().map(|x| i64::try_from(x).unwrap_or(i64::MAX)).collect())
    }
}

impl From<Vec<f64>> for StatValue {
    fn from(v: Vec<f64>) -> Self {
        StatValue::Floats(v)
    }
}

/// Ordered map of stats, nested through key prefixes.
///
/// Children are merged with [`add_sensor_stats`](Self::add_sensor_stats),
/// which copies every child key under `"{prefix}_"`. Composite operations use
/// [`add_indexed_sensor_stats`](Self::add_indexed_sensor_stats) so the first
/// child of a sequence lands under `sequential_000_...`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorStats {
    values: BTreeMap<String, StatValue>,
}

impl SensorStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<StatValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Copy every entry of `child` under `"{prefix}_{child_key}"`.
    pub fn add_sensor_stats(&mut self, prefix: &str, child: &SensorStats) {
        for (key, value) in &child.values {
            self.values.insert(format!("{prefix}_{key}"), value.clone());
        }
    }

    /// Copy `child` under `"{tag}_{index:03}"`.
    pub fn add_indexed_sensor_stats(&mut self, tag: &str, index: usize, child: &SensorStats) {
        self.add_sensor_stats(&format!("{tag}_{index:03}"), child);
    }

    /// Look up a value.
    pub fn value(&self, key: &str) -> Option<&StatValue> {
        self.values.get(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries whose key starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a StatValue)> {
        self.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Log every entry at `info` level under `tag`.
    pub fn log_stats(&self, tag: &str) {
        for (key, value) in &self.values {
            info!(target: "sensor_harness::stats", tag, key = %key, value = %value, "sensor stat");
        }
    }
}
