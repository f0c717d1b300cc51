//! Error taxonomy for sensor operations.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by listeners, the sensor manager and operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform rejected a register or flush request.
    #[error("{0}")]
    Registration(String),

    /// A bounded wait did not reach its target before the timeout.
    #[error("{0}")]
    Timeout(String),

    /// One or more statistical properties were violated.
    #[error("{0}")]
    Verification(String),

    /// A child operation (or iteration) failed; `message` carries its index.
    #[error("{message}")]
    Child {
        /// Annotated message, e.g. `Operation 1 failed: "..."`.
        message: String,
        /// The child's own failure.
        #[source]
        source: Box<Error>,
    },

    /// Combined failure of a parallel operation.
    #[error("{message}")]
    Aggregate {
        /// Summary naming every failure and timed-out index.
        message: String,
        /// Failures reported by children that finished, with their index.
        failures: Vec<(usize, Error)>,
        /// Indices of children still running when the deadline passed.
        timed_out: Vec<usize>,
    },

    /// Cooperative cancellation fired while the operation was blocked.
    #[error("operation interrupted")]
    Interrupted,

    /// The power manager could not provide a wake lock.
    #[error("failed to acquire wake lock '{tag}': {reason}")]
    WakeLock {
        /// Tag the lock was requested under.
        tag: String,
        /// Platform explanation.
        reason: String,
    },

    /// `execute` was called on an operation that already ran.
    #[error("operation has already been executed")]
    AlreadyExecuted,

    /// A child panicked instead of returning.
    #[error("operation panicked: {0}")]
    Panicked(String),

    /// The worker pool for a parallel operation could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// Invalid harness or environment configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Report serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is, or wraps, an interruption.
    ///
    /// Composite operations use this to rethrow cancellation unchanged
    /// instead of annotating it as a child failure.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Interrupted => true,
            Error::Child { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }

    /// Whether this error came from a failed verification or wait, as opposed
    /// to an infrastructure problem.
    pub fn is_assertion(&self) -> bool {
        match self {
            Error::Registration(_)
            | Error::Timeout(_)
            | Error::Verification(_)
            | Error::Aggregate { .. } => true,
            Error::Child { source, .. } => source.is_assertion(),
            _ => false,
        }
    }
}
