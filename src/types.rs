//! Sensor descriptors and event snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of physical or virtual sensor.
///
/// Only the kinds that have default verification thresholds are named; any
/// other platform type is carried as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// Acceleration including gravity, m/s².
    Accelerometer,
    /// Ambient magnetic field, µT.
    MagneticField,
    /// Rate of rotation, rad/s.
    Gyroscope,
    /// Ambient light, lux.
    Light,
    /// Atmospheric pressure, hPa.
    Pressure,
    /// Proximity distance, cm.
    Proximity,
    /// Gravity vector, m/s².
    Gravity,
    /// Acceleration excluding gravity, m/s².
    LinearAcceleration,
    /// Orientation as a rotation vector.
    RotationVector,
    /// Steps since last reboot.
    StepCounter,
    /// One-shot significant motion trigger.
    SignificantMotion,
    /// Any other platform type id.
    Other(i32),
}

/// How a sensor delivers events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportingMode {
    /// Events at a constant rate.
    Continuous,
    /// Events only when the value changes.
    OnChange,
    /// A single event, then the sensor disables itself.
    OneShot,
    /// Sensor-specific delivery rules.
    Special,
}

/// Descriptor of one sensor exposed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    handle: i32,
    name: String,
    vendor: String,
    sensor_type: SensorType,
    reporting_mode: ReportingMode,
    min_delay_us: u32,
    max_delay_us: u32,
    fifo_max_event_count: u32,
    fifo_reserved_event_count: u32,
    wake_up: bool,
}

impl Sensor {
    /// Create a continuous, non-wake-up sensor with no FIFO.
    ///
    /// Refine it with the consuming setters:
    ///
    /// ```ignore
    /// let accel = Sensor::new(1, "accel", SensorType::Accelerometer)
    ///     .min_delay_us(5_000)
    ///     .fifo(3_000, 300);
    /// ```
    pub fn new(handle: i32, name: impl Into<String>, sensor_type: SensorType) -> Self {
        Self {
            handle,
            name: name.into(),
            vendor: String::new(),
            sensor_type,
            reporting_mode: ReportingMode::Continuous,
            min_delay_us: 0,
            max_delay_us: 0,
            fifo_max_event_count: 0,
            fifo_reserved_event_count: 0,
            wake_up: false,
        }
    }

    /// Set the vendor string.
    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Set the reporting mode.
    pub fn reporting_mode(mut self, mode: ReportingMode) -> Self {
        self.reporting_mode = mode;
        self
    }

    /// Set the minimum delay between events (fastest rate) in microseconds.
    pub fn min_delay_us(mut self, us: u32) -> Self {
        self.min_delay_us = us;
        self
    }

    /// Set the maximum delay between events in microseconds (0 = unbounded).
    pub fn max_delay_us(mut self, us: u32) -> Self {
        self.max_delay_us = us;
        self
    }

    /// Set FIFO sizes.
    pub fn fifo(mut self, max_event_count: u32, reserved_event_count: u32) -> Self {
        self.fifo_max_event_count = max_event_count;
        self.fifo_reserved_event_count = reserved_event_count;
        self
    }

    /// Mark the sensor as wake-up.
    pub fn wake_up(mut self, yes: bool) -> Self {
        self.wake_up = yes;
        self
    }

    /// Platform handle.
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Human readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vendor string.
    pub fn vendor_name(&self) -> &str {
        &self.vendor
    }

    /// Sensor kind.
    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    /// Delivery mode.
    pub fn mode(&self) -> ReportingMode {
        self.reporting_mode
    }

    /// Fastest supported sampling period in microseconds.
    pub fn min_delay(&self) -> u32 {
        self.min_delay_us
    }

    /// Slowest supported sampling period in microseconds (0 = unbounded).
    pub fn max_delay(&self) -> u32 {
        self.max_delay_us
    }

    /// Events the hardware FIFO can hold.
    pub fn fifo_max_event_count(&self) -> u32 {
        self.fifo_max_event_count
    }

    /// FIFO slots reserved for this sensor.
    pub fn fifo_reserved_event_count(&self) -> u32 {
        self.fifo_reserved_event_count
    }

    /// Whether the sensor wakes the application processor.
    pub fn is_wake_up(&self) -> bool {
        self.wake_up
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (handle {})", self.name, self.handle)
    }
}

/// Immutable snapshot of one sensor callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSensorEvent {
    /// Handle of the sensor that produced the event.
    pub sensor_handle: i32,
    /// Sensor timestamp in nanoseconds (monotonic per-sensor clock).
    pub timestamp: i64,
    /// Wall-clock receipt time in nanoseconds, 0 when unknown.
    pub received_timestamp: i64,
    /// Reported values.
    pub values: Vec<f32>,
    /// Accuracy reported with the event.
    pub accuracy: i32,
}

impl TestSensorEvent {
    /// Create an event with no receipt time.
    pub fn new(sensor_handle: i32, timestamp: i64, values: Vec<f32>, accuracy: i32) -> Self {
        Self {
            sensor_handle,
            timestamp,
            received_timestamp: 0,
            values,
            accuracy,
        }
    }

    /// Attach the time the event was received.
    pub fn with_received_timestamp(mut self, received_ns: i64) -> Self {
        self.received_timestamp = received_ns;
        self
    }

    /// Euclidean norm of the values.
    pub fn magnitude(&self) -> f64 {
        self.values
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt()
    }
}
