use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{begin_execution, OperationPlan, SensorOperation};
use crate::error::Result;
use crate::stats::SensorStats;
use crate::sync::CancellationToken;

/// Tag wake locks are requested under.
pub const WAKE_LOCK_TAG: &str = "WakeLockOperation";

/// How much of the device a wake lock keeps awake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WakeLockLevel {
    /// CPU only; screen and keyboard may turn off.
    #[default]
    Partial,
    /// CPU and a dimmed screen.
    ScreenDim,
    /// CPU and a bright screen.
    ScreenBright,
    /// CPU, bright screen and keyboard backlight.
    Full,
}

/// A wake lock held on the platform.
pub trait WakeLock: Send {
    /// Tag the lock was acquired under.
    fn tag(&self) -> &str;

    /// Release the lock. Called once, by [`WakeLockGuard`].
    fn release(&mut self);
}

/// Platform power manager.
pub trait PowerManager: Send + Sync {
    /// Acquire a wake lock of `level`, held until the returned lock is released.
    fn acquire_wake_lock(&self, tag: &str, level: WakeLockLevel) -> Result<Box<dyn WakeLock>>;
}

/// Releases its wake lock on drop.
pub struct WakeLockGuard {
    lock: Box<dyn WakeLock>,
}

impl WakeLockGuard {
    /// Acquire a lock from `power` and guard it.
    pub fn acquire(power: &dyn PowerManager, tag: &str, level: WakeLockLevel) -> Result<Self> {
        let lock = power.acquire_wake_lock(tag, level)?;
        debug!(tag, ?level, "wake lock acquired");
        Ok(Self { lock })
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        debug!(tag = self.lock.tag(), "wake lock released");
        self.lock.release();
    }
}

impl fmt::Debug for WakeLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeLockGuard").field("tag", &self.lock.tag()).finish()
    }
}

/// Runs one operation while a wake lock is held.
///
/// Its stats are the wrapped operation's stats.
pub struct WakeLockOperation {
    operation: Box<SensorOperation>,
    power: Arc<dyn PowerManager>,
    level: WakeLockLevel,
    executed: bool,
}

impl WakeLockOperation {
    /// Wrap `operation` in a partial wake lock.
    pub fn new(operation: impl Into<SensorOperation>, power: Arc<dyn PowerManager>) -> Self {
        Self {
            operation: Box::new(operation.into()),
            power,
            level: WakeLockLevel::Partial,
            executed: false,
        }
    }

    /// Request a different wake lock level.
    pub fn level(mut self, level: WakeLockLevel) -> Self {
        self.level = level;
        self
    }

    /// Stats of the wrapped operation.
    pub fn stats(&self) -> &SensorStats {
        self.operation.stats()
    }

    /// Acquire the lock, run the wrapped operation, release the lock.
    pub fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        begin_execution(&mut self.executed)?;
        let _guard = WakeLockGuard::acquire(self.power.as_ref(), WAKE_LOCK_TAG, self.level)?;
        self.operation.execute(cancel)
    }

    /// Configuration of the subtree.
    pub fn plan(&self) -> OperationPlan {
        OperationPlan::WakeLock {
            level: self.level,
            operation: Box::new(self.operation.plan()),
        }
    }
}

impl Clone for WakeLockOperation {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            power: Arc::clone(&self.power),
            level: self.level,
            executed: false,
        }
    }
}

impl fmt::Debug for WakeLockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeLockOperation")
            .field("level", &self.level)
            .field("operation", &self.operation)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}
