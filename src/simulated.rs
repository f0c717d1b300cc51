//! In-process sensor subsystem and power manager.
//!
//! [`SimulatedSensorManager`] spawns one emitter thread per registration that
//! delivers events at the requested rate with nominal timestamps
//! (`start + i * period`) and seeded Gaussian noise around a per-type resting
//! value. Knobs inject the failures the harness must survive: refused
//! registrations and flushes, lost flush completions and event starvation.
//!
//! ```ignore
//! let platform = SimulatedSensorManager::new();
//! platform.set_max_events(Some(3));
//! let env = TestSensorEnvironment::new(platform.clone(), sensor).into_shared();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::helpers::wall_clock_ns;
use crate::listener::SensorEventListener;
use crate::manager::SensorManager;
use crate::operations::{PowerManager, WakeLock, WakeLockLevel};
use crate::sync::{lock, CancellationToken};
use crate::types::{Sensor, SensorType, TestSensorEvent};

/// Period used when neither the request nor the sensor names one.
const FALLBACK_PERIOD_US: u32 = 20_000;

/// Default standard deviation of the generated noise.
const DEFAULT_NOISE_STD: f64 = 0.02;

/// Produces the values of event `i`.
pub type ValueGenerator = Arc<dyn Fn(usize) -> Vec<f32> + Send + Sync>;

/// Resting reading of a sensor of `sensor_type`.
pub fn resting_values(sensor_type: SensorType) -> Vec<f32> {
    match sensor_type {
        SensorType::Accelerometer | SensorType::Gravity => vec![0.0, 0.0, 9.80665],
        SensorType::MagneticField => vec![20.0, -5.0, -40.0],
        SensorType::Gyroscope | SensorType::LinearAcceleration => vec![0.0, 0.0, 0.0],
        SensorType::RotationVector => vec![0.0, 0.0, 0.0, 1.0],
        SensorType::Pressure => vec![1013.25],
        SensorType::Light => vec![100.0],
        SensorType::Proximity => vec![5.0],
        SensorType::StepCounter | SensorType::SignificantMotion | SensorType::Other(_) => vec![0.0],
    }
}

#[derive(Clone)]
struct EmitterSettings {
    max_events: Option<usize>,
    scripted_timestamps: Option<Vec<i64>>,
    generator: Option<ValueGenerator>,
    noise_std: f64,
    seed: u64,
}

struct Registration {
    listener: Arc<dyn SensorEventListener>,
    sensor: Sensor,
    stop: CancellationToken,
    emitter: Option<JoinHandle<()>>,
}

fn same_listener(a: &Arc<dyn SensorEventListener>, b: &Arc<dyn SensorEventListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Simulated platform [`SensorManager`].
pub struct SimulatedSensorManager {
    origin: Instant,
    sensors: Mutex<Vec<Sensor>>,
    registrations: Mutex<Vec<Registration>>,
    settings: Mutex<EmitterSettings>,
    fail_registration: AtomicBool,
    fail_flush: AtomicBool,
    suppress_flush_completion: AtomicBool,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    next_seed: AtomicU64,
}

impl SimulatedSensorManager {
    /// Platform with no failures injected and seed 42.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            sensors: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            settings: Mutex::new(EmitterSettings {
                max_events: None,
                scripted_timestamps: None,
                generator: None,
                noise_std: DEFAULT_NOISE_STD,
                seed: 42,
            }),
            fail_registration: AtomicBool::new(false),
            fail_flush: AtomicBool::new(false),
            suppress_flush_completion: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
            flush_calls: AtomicUsize::new(0),
            next_seed: AtomicU64::new(0),
        })
    }

    /// Expose `sensor` through [`default_sensor`](Self::default_sensor).
    pub fn add_sensor(&self, sensor: Sensor) {
        lock(&self.sensors).push(sensor);
    }

    /// First added sensor of `sensor_type`.
    pub fn default_sensor(&self, sensor_type: SensorType) -> Option<Sensor> {
        lock(&self.sensors)
            .iter()
            .find(|s| s.sensor_type() == sensor_type)
            .cloned()
    }

    /// Refuse every registration.
    pub fn set_fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    /// Refuse every flush request.
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Accept flush requests but never report completion.
    pub fn set_suppress_flush_completion(&self, suppress: bool) {
        self.suppress_flush_completion.store(suppress, Ordering::SeqCst);
    }

    /// Stop emitting after `max` events per registration (`None` = unbounded).
    pub fn set_max_events(&self, max: Option<usize>) {
        lock(&self.settings).max_events = max;
    }

    /// Emit exactly these timestamps, in order, for subsequent registrations.
    pub fn set_scripted_timestamps(&self, timestamps: Option<Vec<i64>>) {
        lock(&self.settings).scripted_timestamps = timestamps;
    }

    /// Replace the noisy resting values with `generator`.
    pub fn set_value_generator(&self, generator: Option<ValueGenerator>) {
        lock(&self.settings).generator = generator;
    }

    /// Standard deviation of the Gaussian noise added to resting values.
    pub fn set_noise_std(&self, std: f64) {
        lock(&self.settings).noise_std = std;
    }

    /// Base seed of the noise generators.
    pub fn set_seed(&self, seed: u64) {
        lock(&self.settings).seed = seed;
    }

    /// Calls to `register_listener`, accepted or not.
    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Calls to `unregister_listener`.
    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    /// Calls to `flush`, accepted or not.
    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    /// Registrations currently delivering events.
    pub fn active_registrations(&self) -> usize {
        lock(&self.registrations).len()
    }

    fn spawn_emitter(
        &self,
        listener: Arc<dyn SensorEventListener>,
        sensor: Sensor,
        period_us: u32,
        stop: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let mut settings = lock(&self.settings).clone();
        settings.seed = settings
            .seed
            .wrapping_add(self.next_seed.fetch_add(1, Ordering::SeqCst));
        let origin = self.origin;
        let name = format!("sim-{}", sensor.name());

        thread::Builder::new()
            .name(name)
            .spawn(move || emit(listener, sensor, period_us, settings, origin, stop))
            .map_err(|e| Error::Registration(format!("failed to start emitter: {e}")))
    }
}

fn emit(
    listener: Arc<dyn SensorEventListener>,
    sensor: Sensor,
    period_us: u32,
    settings: EmitterSettings,
    origin: Instant,
    stop: CancellationToken,
) {
    let period = Duration::from_micros(u64::from(period_us));
    let period_ns = i64::from(period_us) * 1_000;
    let start_ns = i64::try_from(origin.elapsed().as_nanos()).unwrap_or(i64::MAX);
    let resting = resting_values(sensor.sensor_type());
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let noise = Normal::new(0.0, settings.noise_std.max(0.0)).ok();

    let limit = match (&settings.scripted_timestamps, settings.max_events) {
        (Some(script), Some(max)) => Some(script.len().min(max)),
        (Some(script), None) => Some(script.len()),
        (None, max) => max,
    };

    let mut index = 0usize;
    while limit.map_or(true, |limit| index < limit) {
        if stop.is_cancelled() {
            return;
        }
        let timestamp = match &settings.scripted_timestamps {
            Some(script) => script[index],
            None => start_ns + index as i64 * period_ns,
        };
        let values = match &settings.generator {
            Some(generator) => generator(index),
            None => resting
                .iter()
                .map(|&v| match &noise {
                    Some(noise) => v + noise.sample(&mut rng) as f32,
                    None => v,
                })
                .collect(),
        };
        let event = TestSensorEvent::new(sensor.handle(), timestamp, values, 3)
            .with_received_timestamp(wall_clock_ns());
        listener.on_sensor_changed(&event);
        index += 1;

        if stop.sleep(period).is_err() {
            return;
        }
    }
    debug!(sensor = %sensor, events = index, "emitter exhausted");
}

impl SensorManager for SimulatedSensorManager {
    fn register_listener(
        &self,
        listener: Arc<dyn SensorEventListener>,
        sensor: &Sensor,
        sampling_period_us: u32,
        _max_report_latency_us: u32,
    ) -> bool {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_registration.load(Ordering::SeqCst) {
            return false;
        }

        let period_us = match (sampling_period_us, sensor.min_delay()) {
            (0, 0) => FALLBACK_PERIOD_US,
            (0, min_delay) => min_delay,
            (requested, min_delay) => requested.max(min_delay),
        };
        let stop = CancellationToken::new();
        let emitter = match self.spawn_emitter(Arc::clone(&listener), sensor.clone(), period_us, stop.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "simulated registration failed");
                return false;
            }
        };
        lock(&self.registrations).push(Registration {
            listener,
            sensor: sensor.clone(),
            stop,
            emitter: Some(emitter),
        });
        true
    }

    fn unregister_listener(&self, listener: &Arc<dyn SensorEventListener>, sensor: &Sensor) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        let removed: Vec<Registration> = {
            let mut registrations = lock(&self.registrations);
            let (removed, kept) = std::mem::take(&mut *registrations)
                .into_iter()
                .partition(|r| same_listener(&r.listener, listener) && r.sensor.handle() == sensor.handle());
            *registrations = kept;
            removed
        };
        for mut registration in removed {
            registration.stop.cancel();
            if let Some(emitter) = registration.emitter.take() {
                if emitter.join().is_err() {
                    warn!(sensor = %registration.sensor, "emitter thread panicked");
                }
            }
        }
    }

    fn flush(&self, listener: &Arc<dyn SensorEventListener>) -> bool {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return false;
        }
        let sensors: Vec<Sensor> = lock(&self.registrations)
            .iter()
            .filter(|r| same_listener(&r.listener, listener))
            .map(|r| r.sensor.clone())
            .collect();
        if sensors.is_empty() {
            return false;
        }
        if self.suppress_flush_completion.load(Ordering::SeqCst) {
            return true;
        }
        let listener = Arc::clone(listener);
        thread::spawn(move || {
            for sensor in &sensors {
                listener.on_flush_completed(sensor);
            }
        });
        true
    }
}

impl fmt::Debug for SimulatedSensorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedSensorManager")
            .field("active_registrations", &self.active_registrations())
            .field("register_calls", &self.register_calls())
            .field("unregister_calls", &self.unregister_calls())
            .finish_non_exhaustive()
    }
}

/// Simulated [`PowerManager`] counting acquisitions and releases.
#[derive(Debug, Default)]
pub struct SimulatedPowerManager {
    counters: Arc<LockCounters>,
    fail: AtomicBool,
}

#[derive(Debug, Default)]
struct LockCounters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl SimulatedPowerManager {
    /// Power manager granting every request.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse every wake lock request.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Wake locks granted.
    pub fn acquire_count(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Wake locks released.
    pub fn release_count(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Wake locks granted and not yet released.
    pub fn held_count(&self) -> usize {
        self.acquire_count().saturating_sub(self.release_count())
    }
}

struct SimulatedWakeLock {
    tag: String,
    counters: Arc<LockCounters>,
}

impl WakeLock for SimulatedWakeLock {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn release(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl PowerManager for SimulatedPowerManager {
    fn acquire_wake_lock(&self, tag: &str, level: WakeLockLevel) -> Result<Box<dyn WakeLock>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::WakeLock {
                tag: tag.to_string(),
                reason: format!("{level:?} wake lock refused"),
            });
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedWakeLock {
            tag: tag.to_string(),
            counters: Arc::clone(&self.counters),
        }))
    }
}
